use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::workflows::training::domain::{
    ClassId, ClassSubject, ClassSubjectId, Course, CourseId, CourseLevel, CourseProgress,
    CourseStatus, Grade, GradeComponents, GradeStatus, InstructorAssignment, RequestStatus,
    ScheduleId, ScheduleStatus, SpecialtyId, SubjectId, TraineeAssign, TraineeAssignId,
    TraineeId, TrainingClass, TrainingSchedule, UserId,
};
use crate::workflows::training::progress::ProgressSweep;
use crate::workflows::training::repository::{
    CourseRepository, GradeRepository, RepositoryError, RosterRepository, ScheduleRepository,
};

pub(super) fn at(date: (i32, u32, u32), hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

pub(super) fn course(id: &str, progress: CourseProgress) -> Course {
    Course {
        id: CourseId(id.to_string()),
        name: format!("Course {id}"),
        level: CourseLevel::Initial,
        status: CourseStatus::Approved,
        progress,
        starts_at: at((2025, 3, 1), 8),
        ends_at: at((2025, 9, 1), 17),
        related_course_id: None,
        subject_specialties: Vec::new(),
    }
}

pub(super) fn closed_schedule(id: &str, class_subject: &str) -> TrainingSchedule {
    schedule_with_status(id, class_subject, ScheduleStatus::Completed)
}

pub(super) fn schedule_with_status(
    id: &str,
    class_subject: &str,
    status: ScheduleStatus,
) -> TrainingSchedule {
    TrainingSchedule {
        id: ScheduleId(id.to_string()),
        class_subject_id: ClassSubjectId(class_subject.to_string()),
        instructor_id: UserId("ins-01".to_string()),
        teaching_days: [Weekday::Mon].into_iter().collect::<BTreeSet<_>>(),
        class_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        duration_minutes: 90,
        start_day: NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date"),
        end_day: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
        location: "Main Campus".to_string(),
        room: "101".to_string(),
        status,
    }
}

pub(super) fn passing_grade(assign: &str) -> Grade {
    Grade {
        trainee_assign_id: TraineeAssignId(assign.to_string()),
        subject_id: SubjectId("sub-01".to_string()),
        components: GradeComponents {
            participation: 7.0,
            assignment: 8.0,
            final_exam: 6.5,
            resit: None,
        },
        total: 6.8,
        status: GradeStatus::Pass,
    }
}

#[derive(Default)]
pub(super) struct MemoryProgressStore {
    pub(super) courses: Mutex<HashMap<CourseId, Course>>,
    pub(super) classes: Mutex<Vec<TrainingClass>>,
    pub(super) class_subjects: Mutex<Vec<ClassSubject>>,
    pub(super) schedules: Mutex<HashMap<ScheduleId, TrainingSchedule>>,
    pub(super) assigns: Mutex<Vec<TraineeAssign>>,
    pub(super) grades: Mutex<Vec<Grade>>,
    pub(super) failing_courses: Mutex<HashSet<CourseId>>,
}

impl MemoryProgressStore {
    pub(super) fn insert_course(&self, course: Course) {
        self.courses
            .lock()
            .expect("course mutex poisoned")
            .insert(course.id.clone(), course);
    }

    /// Register a class subject with one class per course, returning its id.
    pub(super) fn add_class_subject(&self, course: &str, class_subject: &str) -> ClassSubjectId {
        let class_id = ClassId(format!("{course}-class"));
        let mut classes = self.classes.lock().expect("class mutex poisoned");
        if !classes.iter().any(|class| class.id == class_id) {
            classes.push(TrainingClass {
                id: class_id.clone(),
                course_id: CourseId(course.to_string()),
                name: format!("{course} cohort"),
            });
        }
        drop(classes);

        let id = ClassSubjectId(class_subject.to_string());
        self.class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .push(ClassSubject {
                id: id.clone(),
                class_id,
                subject_id: SubjectId("sub-01".to_string()),
                specialty_id: SpecialtyId("avionics".to_string()),
            });
        id
    }

    pub(super) fn add_schedule(&self, schedule: TrainingSchedule) {
        self.schedules
            .lock()
            .expect("schedule mutex poisoned")
            .insert(schedule.id.clone(), schedule);
    }

    pub(super) fn add_assign(&self, id: &str, class_subject: &str, graded: bool) {
        self.assigns
            .lock()
            .expect("assign mutex poisoned")
            .push(TraineeAssign {
                id: TraineeAssignId(id.to_string()),
                trainee_id: TraineeId(format!("trainee-{id}")),
                class_subject_id: ClassSubjectId(class_subject.to_string()),
                status: RequestStatus::Approved,
            });
        if graded {
            self.grades
                .lock()
                .expect("grade mutex poisoned")
                .push(passing_grade(id));
        }
    }

    pub(super) fn fail_course(&self, course: &str) {
        self.failing_courses
            .lock()
            .expect("failure mutex poisoned")
            .insert(CourseId(course.to_string()));
    }

    pub(super) fn progress_of(&self, course: &str) -> CourseProgress {
        self.courses
            .lock()
            .expect("course mutex poisoned")
            .get(&CourseId(course.to_string()))
            .expect("course present")
            .progress
    }
}

impl CourseRepository for MemoryProgressStore {
    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self
            .courses
            .lock()
            .expect("course mutex poisoned")
            .get(id)
            .cloned())
    }

    fn classes(&self, course: &CourseId) -> Result<Vec<TrainingClass>, RepositoryError> {
        if self
            .failing_courses
            .lock()
            .expect("failure mutex poisoned")
            .contains(course)
        {
            return Err(RepositoryError::Unavailable("class listing offline".to_string()));
        }

        Ok(self
            .classes
            .lock()
            .expect("class mutex poisoned")
            .iter()
            .filter(|class| &class.course_id == course)
            .cloned()
            .collect())
    }

    fn class_subject(
        &self,
        id: &ClassSubjectId,
    ) -> Result<Option<ClassSubject>, RepositoryError> {
        Ok(self
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .iter()
            .find(|class_subject| &class_subject.id == id)
            .cloned())
    }

    fn class_subjects(
        &self,
        course: &CourseId,
    ) -> Result<Vec<ClassSubject>, RepositoryError> {
        let classes = self.classes(course)?;
        Ok(self
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .iter()
            .filter(|class_subject| {
                classes.iter().any(|class| class.id == class_subject.class_id)
            })
            .cloned()
            .collect())
    }

    fn courses_in_flight(&self) -> Result<Vec<Course>, RepositoryError> {
        let mut courses: Vec<Course> = self
            .courses
            .lock()
            .expect("course mutex poisoned")
            .values()
            .filter(|course| {
                course.status == CourseStatus::Approved
                    && course.progress != CourseProgress::Completed
            })
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(courses)
    }

    fn update_progress(
        &self,
        id: &CourseId,
        progress: CourseProgress,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.courses.lock().expect("course mutex poisoned");
        let course = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        course.progress = progress;
        Ok(())
    }
}

impl ScheduleRepository for MemoryProgressStore {
    fn schedule_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Option<TrainingSchedule>, RepositoryError> {
        Ok(self
            .schedules
            .lock()
            .expect("schedule mutex poisoned")
            .values()
            .find(|schedule| &schedule.class_subject_id == class_subject)
            .cloned())
    }

    fn schedules_for_room(
        &self,
        _location: &str,
        _room: &str,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        Ok(Vec::new())
    }

    fn schedules_for_instructor(
        &self,
        _instructor: &UserId,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        Ok(Vec::new())
    }

    fn persist_with_assignment(
        &self,
        schedule: TrainingSchedule,
        _assignment: InstructorAssignment,
    ) -> Result<TrainingSchedule, RepositoryError> {
        self.add_schedule(schedule.clone());
        Ok(schedule)
    }
}

impl RosterRepository for MemoryProgressStore {
    fn assigns_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError> {
        Ok(self
            .assigns
            .lock()
            .expect("assign mutex poisoned")
            .iter()
            .filter(|assign| &assign.class_subject_id == class_subject)
            .cloned()
            .collect())
    }

    fn assigns_for_course(
        &self,
        _course: &CourseId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError> {
        Ok(Vec::new())
    }
}

impl GradeRepository for MemoryProgressStore {
    fn grades_for_assign(
        &self,
        assign: &TraineeAssignId,
    ) -> Result<Vec<Grade>, RepositoryError> {
        Ok(self
            .grades
            .lock()
            .expect("grade mutex poisoned")
            .iter()
            .filter(|grade| &grade.trainee_assign_id == assign)
            .cloned()
            .collect())
    }

    fn record_grade(&self, grade: Grade) -> Result<(), RepositoryError> {
        self.grades.lock().expect("grade mutex poisoned").push(grade);
        Ok(())
    }
}

pub(super) fn build_sweep() -> (ProgressSweep<MemoryProgressStore>, Arc<MemoryProgressStore>) {
    let store = Arc::new(MemoryProgressStore::default());
    (
        ProgressSweep::new(store.clone(), Duration::from_secs(60)),
        store,
    )
}
