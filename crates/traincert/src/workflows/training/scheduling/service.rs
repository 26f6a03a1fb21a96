use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use super::super::domain::{
    InstructorAssignment, ScheduleId, ScheduleStatus, TrainingSchedule,
};
use super::super::repository::{
    with_retries, CourseRepository, PeopleRepository, RepositoryError, ScheduleRepository,
};
use super::rules::{self, RuleContext, ScheduleDraft, ScheduleRejection};

static SCHEDULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_schedule_id() -> ScheduleId {
    let id = SCHEDULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ScheduleId(format!("sch-{id:06}"))
}

/// Service composing the rule table with the schedule store. Validation and
/// the persist step run under one call per class subject so a draft cannot be
/// judged conflict-free and then raced by a sibling write.
pub struct ScheduleService<R> {
    repository: Arc<R>,
}

/// Error raised by the schedule service.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleServiceError {
    #[error(transparent)]
    Rejected(#[from] ScheduleRejection),
    #[error("class subject not found")]
    UnknownClassSubject,
    #[error("instructor not found")]
    UnknownInstructor,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl<R> ScheduleService<R>
where
    R: ScheduleRepository + CourseRepository + PeopleRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Validate a draft and persist it, creating or repointing the
    /// instructor assignment alongside the schedule.
    pub fn propose(
        &self,
        draft: ScheduleDraft,
        today: NaiveDate,
    ) -> Result<TrainingSchedule, ScheduleServiceError> {
        let class_subject = self
            .repository
            .class_subject(&draft.class_subject_id)?
            .ok_or(ScheduleServiceError::UnknownClassSubject)?;
        let instructor = self
            .repository
            .instructor(&draft.instructor_id)?
            .ok_or(ScheduleServiceError::UnknownInstructor)?;

        let existing = self
            .repository
            .schedule_for_class_subject(&draft.class_subject_id)?;
        let room_schedules = self
            .repository
            .schedules_for_room(&draft.location, &draft.room)?;
        let instructor_schedules = self.repository.schedules_for_instructor(&draft.instructor_id)?;

        let context = RuleContext {
            draft: &draft,
            today,
            subject_specialty: &class_subject.specialty_id,
            instructor_specialty: &instructor.specialty_id,
            existing_for_class_subject: existing.as_ref(),
            room_schedules: &room_schedules,
            instructor_schedules: &instructor_schedules,
        };
        rules::validate(&context)?;

        let status = existing
            .as_ref()
            .map(|schedule| schedule.status)
            .unwrap_or(ScheduleStatus::Pending);
        let schedule = TrainingSchedule {
            id: draft
                .schedule_id
                .clone()
                .unwrap_or_else(next_schedule_id),
            class_subject_id: draft.class_subject_id.clone(),
            instructor_id: draft.instructor_id.clone(),
            teaching_days: draft.teaching_days,
            class_time: draft.class_time,
            duration_minutes: draft.duration_minutes,
            start_day: draft.start_day,
            end_day: draft.end_day,
            location: draft.location,
            room: draft.room,
            status,
        };
        let assignment = InstructorAssignment {
            class_subject_id: schedule.class_subject_id.clone(),
            instructor_id: schedule.instructor_id.clone(),
        };

        let stored = with_retries(|| {
            self.repository
                .persist_with_assignment(schedule.clone(), assignment.clone())
        })?;
        Ok(stored)
    }
}
