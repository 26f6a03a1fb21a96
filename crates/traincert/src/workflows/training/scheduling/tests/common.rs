use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveTime, Weekday};

use crate::workflows::training::domain::{
    ClassId, ClassSubject, ClassSubjectId, Course, CourseId, CourseProgress,
    InstructorAssignment, InstructorProfile, ScheduleId, ScheduleStatus, SpecialtyId, SubjectId,
    TraineeId, TraineeProfile, TrainingClass, TrainingSchedule, UserId,
};
use crate::workflows::training::repository::{
    CourseRepository, PeopleRepository, RepositoryError, ScheduleRepository,
};
use crate::workflows::training::scheduling::{ScheduleDraft, ScheduleService};

pub(super) fn specialty() -> SpecialtyId {
    SpecialtyId("avionics".to_string())
}

pub(super) fn class_subject() -> ClassSubject {
    ClassSubject {
        id: ClassSubjectId("cs-01".to_string()),
        class_id: ClassId("cls-01".to_string()),
        subject_id: SubjectId("sub-01".to_string()),
        specialty_id: specialty(),
    }
}

pub(super) fn instructor() -> InstructorProfile {
    InstructorProfile {
        id: UserId("ins-01".to_string()),
        full_name: "Minh Tran".to_string(),
        specialty_id: specialty(),
    }
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

pub(super) fn draft() -> ScheduleDraft {
    ScheduleDraft {
        schedule_id: None,
        class_subject_id: class_subject().id,
        instructor_id: instructor().id,
        teaching_days: days(&[Weekday::Mon, Weekday::Wed]),
        class_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        duration_minutes: 90,
        start_day: NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid date"),
        end_day: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
        location: "Main Campus".to_string(),
        room: "101".to_string(),
    }
}

pub(super) fn days(list: &[Weekday]) -> BTreeSet<Weekday> {
    list.iter().copied().collect()
}

pub(super) fn persisted_schedule(
    id: &str,
    class_subject: &str,
    days_of_week: &[Weekday],
    class_time: (u32, u32),
    duration_minutes: u32,
    range: ((i32, u32, u32), (i32, u32, u32)),
) -> TrainingSchedule {
    let ((start_y, start_m, start_d), (end_y, end_m, end_d)) = range;
    TrainingSchedule {
        id: ScheduleId(id.to_string()),
        class_subject_id: ClassSubjectId(class_subject.to_string()),
        instructor_id: UserId("ins-02".to_string()),
        teaching_days: days(days_of_week),
        class_time: NaiveTime::from_hms_opt(class_time.0, class_time.1, 0).expect("valid time"),
        duration_minutes,
        start_day: NaiveDate::from_ymd_opt(start_y, start_m, start_d).expect("valid date"),
        end_day: NaiveDate::from_ymd_opt(end_y, end_m, end_d).expect("valid date"),
        location: "Main Campus".to_string(),
        room: "101".to_string(),
        status: ScheduleStatus::Incoming,
    }
}

#[derive(Default)]
pub(super) struct MemoryScheduleStore {
    pub(super) class_subjects: Mutex<HashMap<ClassSubjectId, ClassSubject>>,
    pub(super) instructors: Mutex<HashMap<UserId, InstructorProfile>>,
    pub(super) schedules: Mutex<HashMap<ScheduleId, TrainingSchedule>>,
    pub(super) assignments: Mutex<HashMap<ClassSubjectId, InstructorAssignment>>,
    pub(super) persist_failures: Mutex<u32>,
}

impl MemoryScheduleStore {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        store
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .insert(class_subject().id, class_subject());
        store
            .instructors
            .lock()
            .expect("instructor mutex poisoned")
            .insert(instructor().id, instructor());
        store
    }

    pub(super) fn insert_instructor(&self, profile: InstructorProfile) {
        self.instructors
            .lock()
            .expect("instructor mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn insert_schedule(&self, schedule: TrainingSchedule) {
        self.schedules
            .lock()
            .expect("schedule mutex poisoned")
            .insert(schedule.id.clone(), schedule);
    }

    pub(super) fn assignment_for(&self, class_subject: &ClassSubjectId) -> Option<InstructorAssignment> {
        self.assignments
            .lock()
            .expect("assignment mutex poisoned")
            .get(class_subject)
            .cloned()
    }

    pub(super) fn fail_next_persists(&self, count: u32) {
        *self.persist_failures.lock().expect("failure mutex poisoned") = count;
    }
}

impl ScheduleRepository for MemoryScheduleStore {
    fn schedule_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Option<TrainingSchedule>, RepositoryError> {
        let guard = self.schedules.lock().expect("schedule mutex poisoned");
        Ok(guard
            .values()
            .find(|schedule| &schedule.class_subject_id == class_subject)
            .cloned())
    }

    fn schedules_for_room(
        &self,
        location: &str,
        room: &str,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        let guard = self.schedules.lock().expect("schedule mutex poisoned");
        Ok(guard
            .values()
            .filter(|schedule| schedule.location == location && schedule.room == room)
            .cloned()
            .collect())
    }

    fn schedules_for_instructor(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        let guard = self.schedules.lock().expect("schedule mutex poisoned");
        Ok(guard
            .values()
            .filter(|schedule| &schedule.instructor_id == instructor)
            .cloned()
            .collect())
    }

    fn persist_with_assignment(
        &self,
        schedule: TrainingSchedule,
        assignment: InstructorAssignment,
    ) -> Result<TrainingSchedule, RepositoryError> {
        let mut failures = self.persist_failures.lock().expect("failure mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        drop(failures);

        self.schedules
            .lock()
            .expect("schedule mutex poisoned")
            .insert(schedule.id.clone(), schedule.clone());
        self.assignments
            .lock()
            .expect("assignment mutex poisoned")
            .insert(assignment.class_subject_id.clone(), assignment);
        Ok(schedule)
    }
}

impl CourseRepository for MemoryScheduleStore {
    fn course(&self, _id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(None)
    }

    fn classes(&self, _course: &CourseId) -> Result<Vec<TrainingClass>, RepositoryError> {
        Ok(Vec::new())
    }

    fn class_subject(
        &self,
        id: &ClassSubjectId,
    ) -> Result<Option<ClassSubject>, RepositoryError> {
        let guard = self.class_subjects.lock().expect("class subject mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn class_subjects(
        &self,
        _course: &CourseId,
    ) -> Result<Vec<ClassSubject>, RepositoryError> {
        Ok(Vec::new())
    }

    fn courses_in_flight(&self) -> Result<Vec<Course>, RepositoryError> {
        Ok(Vec::new())
    }

    fn update_progress(
        &self,
        _id: &CourseId,
        _progress: CourseProgress,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl PeopleRepository for MemoryScheduleStore {
    fn instructor(&self, id: &UserId) -> Result<Option<InstructorProfile>, RepositoryError> {
        let guard = self.instructors.lock().expect("instructor mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn trainee(&self, _id: &TraineeId) -> Result<Option<TraineeProfile>, RepositoryError> {
        Ok(None)
    }
}

pub(super) fn build_service() -> (ScheduleService<MemoryScheduleStore>, Arc<MemoryScheduleStore>) {
    let store = Arc::new(MemoryScheduleStore::seeded());
    (ScheduleService::new(store.clone()), store)
}
