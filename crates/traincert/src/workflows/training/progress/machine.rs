use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::super::domain::{
    ClassSubjectId, Course, CourseProgress, CourseStatus, ScheduleStatus, TraineeAssignId,
};

/// Grading state of one trainee assignment inside a class subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineeActivity {
    pub assign_id: TraineeAssignId,
    pub graded: bool,
}

/// Everything completion needs to know about one class subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSubjectActivity {
    pub class_subject_id: ClassSubjectId,
    pub schedule_statuses: Vec<ScheduleStatus>,
    pub trainees: Vec<TraineeActivity>,
}

impl ClassSubjectActivity {
    /// A class subject blocks completion while any of its schedules is still
    /// open or any trainee assignment has no recorded grade. A class subject
    /// with zero schedules never blocks.
    pub fn blocks_completion(&self) -> bool {
        if self.schedule_statuses.is_empty() {
            return false;
        }

        let schedules_open = self
            .schedule_statuses
            .iter()
            .any(|status| !status.is_closed());
        let ungraded = self.trainees.iter().any(|trainee| !trainee.graded);
        schedules_open || ungraded
    }
}

/// Point-in-time view of a course's schedules and grades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseActivitySnapshot {
    pub class_subjects: Vec<ClassSubjectActivity>,
}

impl CourseActivitySnapshot {
    pub fn is_complete(&self) -> bool {
        self.class_subjects
            .iter()
            .all(|class_subject| !class_subject.blocks_completion())
    }
}

/// Compute the next progress step for a course, if any.
///
/// Progress only ever advances: `NotYet -> Ongoing` once the start time has
/// passed, `Ongoing -> Completed` once every class subject is finished.
/// Re-evaluating a completed course yields `None`, which keeps the sweep
/// idempotent.
pub fn next_progress(
    course: &Course,
    now: NaiveDateTime,
    snapshot: &CourseActivitySnapshot,
) -> Option<CourseProgress> {
    if course.status != CourseStatus::Approved {
        return None;
    }

    match course.progress {
        CourseProgress::NotYet if now >= course.starts_at => Some(CourseProgress::Ongoing),
        CourseProgress::Ongoing if snapshot.is_complete() => Some(CourseProgress::Completed),
        CourseProgress::NotYet | CourseProgress::Ongoing | CourseProgress::Completed => None,
    }
}
