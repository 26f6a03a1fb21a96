use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Certificate, CertificateId, CertificateTemplate, ClassSubject, ClassSubjectId, Course,
    CourseId, CourseProgress, Decision, Grade, InstructorAssignment, InstructorProfile,
    RenewalEvent, SpecialtyId, Subject, SubjectId, TraineeAssign, TraineeAssignId, TraineeId,
    TraineeProfile, TrainingClass, TrainingSchedule, UserId,
};

/// Error enumeration for storage failures.
///
/// `Unavailable` marks transient connectivity faults; writes behind
/// [`with_retries`] are retried, side-effect reads are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Course catalog reads plus the single progress write the sweep needs.
pub trait CourseRepository: Send + Sync {
    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    fn classes(&self, course: &CourseId) -> Result<Vec<TrainingClass>, RepositoryError>;
    fn class_subject(
        &self,
        id: &ClassSubjectId,
    ) -> Result<Option<ClassSubject>, RepositoryError>;
    fn class_subjects(
        &self,
        course: &CourseId,
    ) -> Result<Vec<ClassSubject>, RepositoryError>;
    /// Approved courses whose progress has not reached `Completed` yet.
    fn courses_in_flight(&self) -> Result<Vec<Course>, RepositoryError>;
    fn update_progress(
        &self,
        id: &CourseId,
        progress: CourseProgress,
    ) -> Result<(), RepositoryError>;
}

/// Instructor and trainee master data.
pub trait PeopleRepository: Send + Sync {
    fn instructor(&self, id: &UserId) -> Result<Option<InstructorProfile>, RepositoryError>;
    fn trainee(&self, id: &TraineeId) -> Result<Option<TraineeProfile>, RepositoryError>;
}

/// Subject master data.
pub trait SubjectRepository: Send + Sync {
    fn subject(&self, id: &SubjectId) -> Result<Option<Subject>, RepositoryError>;
}

/// Trainee assignment reads scoped per class subject or course.
pub trait RosterRepository: Send + Sync {
    fn assigns_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError>;
    fn assigns_for_course(
        &self,
        course: &CourseId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError>;
}

/// Grade reads keyed by assignment.
pub trait GradeRepository: Send + Sync {
    fn grades_for_assign(
        &self,
        assign: &TraineeAssignId,
    ) -> Result<Vec<Grade>, RepositoryError>;
    fn record_grade(&self, grade: Grade) -> Result<(), RepositoryError>;
}

/// Schedule reads for conflict detection and the combined write that keeps
/// validate-then-persist atomic per class subject.
pub trait ScheduleRepository: Send + Sync {
    fn schedule_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Option<TrainingSchedule>, RepositoryError>;
    fn schedules_for_room(
        &self,
        location: &str,
        room: &str,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError>;
    fn schedules_for_instructor(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError>;
    /// Persist the schedule and create or repoint the instructor assignment
    /// in one write.
    fn persist_with_assignment(
        &self,
        schedule: TrainingSchedule,
        assignment: InstructorAssignment,
    ) -> Result<TrainingSchedule, RepositoryError>;
}

/// A single row change inside a certificate batch commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CertificateMutation {
    Create(Certificate),
    /// Renewal in place: the row keeps its identity; the course, specialty,
    /// issuer, issue date, and expiry are restamped from the event, status
    /// returns to Pending, and the event is appended to the history log.
    Renew {
        id: CertificateId,
        course_id: CourseId,
        specialty_id: SpecialtyId,
        event: RenewalEvent,
    },
    MarkExpired(CertificateId),
}

/// Certificate reads plus the transactional batch write.
pub trait CertificateRepository: Send + Sync {
    fn certificate(&self, id: &CertificateId) -> Result<Option<Certificate>, RepositoryError>;
    fn certificates_for_trainee(
        &self,
        trainee: &TraineeId,
    ) -> Result<Vec<Certificate>, RepositoryError>;
    /// The trainee's most recently issued Active certificate for the course,
    /// if any.
    fn active_certificate(
        &self,
        trainee: &TraineeId,
        course: &CourseId,
    ) -> Result<Option<Certificate>, RepositoryError>;
    fn active_certificates_expiring_by(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Certificate>, RepositoryError>;
    /// Apply every mutation or none of them.
    fn commit_batch(
        &self,
        mutations: Vec<CertificateMutation>,
    ) -> Result<Vec<Certificate>, RepositoryError>;
}

/// Certificate template catalog.
pub trait TemplateRepository: Send + Sync {
    fn active_templates(&self) -> Result<Vec<CertificateTemplate>, RepositoryError>;
}

/// Administrative decision log.
pub trait DecisionRepository: Send + Sync {
    fn decision_for_course(
        &self,
        course: &CourseId,
    ) -> Result<Option<Decision>, RepositoryError>;
    fn insert_decision(&self, decision: Decision) -> Result<Decision, RepositoryError>;
}

const WRITE_ATTEMPTS: u32 = 3;

/// Execution-strategy wrapper for writes: transient `Unavailable` failures
/// are retried a bounded number of times, everything else surfaces at once.
pub fn with_retries<T>(
    mut operation: impl FnMut() -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    let mut attempt = 1;
    loop {
        match operation() {
            Err(RepositoryError::Unavailable(reason)) if attempt < WRITE_ATTEMPTS => {
                tracing::warn!(attempt, %reason, "transient repository failure, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}
