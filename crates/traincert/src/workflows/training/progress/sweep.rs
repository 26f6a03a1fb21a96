use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use super::super::domain::{Course, CourseId, CourseProgress, RequestStatus};
use super::super::repository::{
    CourseRepository, GradeRepository, RepositoryError, RosterRepository, ScheduleRepository,
};
use super::machine::{
    next_progress, ClassSubjectActivity, CourseActivitySnapshot, TraineeActivity,
};

/// Result of one pass over the in-flight courses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub advanced: Vec<(CourseId, CourseProgress)>,
    pub failures: Vec<(CourseId, String)>,
    pub interrupted: bool,
}

/// Periodic evaluator advancing course progress from recorded schedules and
/// grades. Each course is processed independently; one failure never aborts
/// the rest of the pass.
pub struct ProgressSweep<R> {
    repository: Arc<R>,
    interval: Duration,
}

impl<R> ProgressSweep<R>
where
    R: CourseRepository + ScheduleRepository + RosterRepository + GradeRepository + 'static,
{
    pub fn new(repository: Arc<R>, interval: Duration) -> Self {
        Self {
            repository,
            interval,
        }
    }

    /// Run passes until the cancellation flag is raised.
    pub async fn run(&self, cancel: Arc<AtomicBool>) {
        loop {
            if cancel.load(Ordering::Acquire) {
                tracing::info!("course progress sweep stopping");
                return;
            }

            let now = Local::now().naive_local();
            let outcome = self.run_once(now, &cancel);
            tracing::info!(
                advanced = outcome.advanced.len(),
                failures = outcome.failures.len(),
                "course progress sweep finished"
            );

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over every in-flight course. The cancellation flag is
    /// observed between courses, never mid-mutation.
    pub fn run_once(&self, now: NaiveDateTime, cancel: &AtomicBool) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        let courses = match self.repository.courses_in_flight() {
            Ok(courses) => courses,
            Err(error) => {
                tracing::error!(%error, "could not list courses for the progress sweep");
                return outcome;
            }
        };

        for course in courses {
            if cancel.load(Ordering::Acquire) {
                outcome.interrupted = true;
                return outcome;
            }

            match self.evaluate_course(&course, now) {
                Ok(Some(progress)) => outcome.advanced.push((course.id.clone(), progress)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(course = %course.id.0, %error, "progress evaluation failed");
                    outcome.failures.push((course.id.clone(), error.to_string()));
                }
            }
        }

        outcome
    }

    fn evaluate_course(
        &self,
        course: &Course,
        now: NaiveDateTime,
    ) -> Result<Option<CourseProgress>, RepositoryError> {
        let snapshot = self.snapshot_course(&course.id)?;
        let Some(progress) = next_progress(course, now, &snapshot) else {
            return Ok(None);
        };

        self.repository.update_progress(&course.id, progress)?;
        Ok(Some(progress))
    }

    fn snapshot_course(&self, course: &CourseId) -> Result<CourseActivitySnapshot, RepositoryError> {
        let mut snapshot = CourseActivitySnapshot::default();

        for class in self.repository.classes(course)? {
            for class_subject in self
                .repository
                .class_subjects(course)?
                .into_iter()
                .filter(|class_subject| class_subject.class_id == class.id)
            {
                let schedule_statuses = self
                    .repository
                    .schedule_for_class_subject(&class_subject.id)?
                    .map(|schedule| vec![schedule.status])
                    .unwrap_or_default();

                let mut trainees = Vec::new();
                for assign in self
                    .repository
                    .assigns_for_class_subject(&class_subject.id)?
                    .into_iter()
                    .filter(|assign| assign.status == RequestStatus::Approved)
                {
                    let graded = !self.repository.grades_for_assign(&assign.id)?.is_empty();
                    trainees.push(TraineeActivity {
                        assign_id: assign.id,
                        graded,
                    });
                }

                snapshot.class_subjects.push(ClassSubjectActivity {
                    class_subject_id: class_subject.id,
                    schedule_statuses,
                    trainees,
                });
            }
        }

        Ok(snapshot)
    }
}
