use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for courses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

/// Identifier wrapper for classes within a course.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(pub String);

/// Identifier wrapper for the class-subject scheduling unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassSubjectId(pub String);

/// Identifier wrapper for subjects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

/// Identifier wrapper for vocational specialties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpecialtyId(pub String);

/// Identifier wrapper for training schedules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

/// Identifier wrapper for trainees.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraineeId(pub String);

/// Identifier wrapper for staff users (instructors, approvers, signers).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for trainee-to-class-subject assignments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraineeAssignId(pub String);

/// Identifier wrapper for certificates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CertificateId(pub String);

/// Identifier wrapper for certificate templates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// Identifier wrapper for administrative decisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub String);

/// Identifier wrapper for approval requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Level of a course offering; renewal semantics hinge on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    Initial,
    Recurrent,
    Relearn,
    Professional,
}

impl CourseLevel {
    pub const fn label(self) -> &'static str {
        match self {
            CourseLevel::Initial => "initial",
            CourseLevel::Recurrent => "recurrent",
            CourseLevel::Relearn => "relearn",
            CourseLevel::Professional => "professional",
        }
    }
}

/// Administrative approval state of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseStatus {
    Pending,
    Approved,
    Rejected,
}

impl CourseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CourseStatus::Pending => "pending",
            CourseStatus::Approved => "approved",
            CourseStatus::Rejected => "rejected",
        }
    }
}

/// Temporal progress of a course; only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CourseProgress {
    NotYet,
    Ongoing,
    Completed,
}

impl CourseProgress {
    pub const fn label(self) -> &'static str {
        match self {
            CourseProgress::NotYet => "not_yet",
            CourseProgress::Ongoing => "ongoing",
            CourseProgress::Completed => "completed",
        }
    }
}

/// Subject-specialty pairing a course teaches and certifies against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSpecialty {
    pub subject_id: SubjectId,
    pub specialty_id: SpecialtyId,
}

/// A course offering with its lineage back to the initial course it renews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub level: CourseLevel,
    pub status: CourseStatus,
    pub progress: CourseProgress,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub related_course_id: Option<CourseId>,
    pub subject_specialties: Vec<SubjectSpecialty>,
}

impl Course {
    /// Initial/Professional courses stand alone; Recurrent/Relearn courses
    /// must point back at the initial course they renew.
    pub fn check_lineage(&self) -> Result<(), InvariantViolation> {
        match (self.level, &self.related_course_id) {
            (CourseLevel::Recurrent | CourseLevel::Relearn, None) => {
                Err(InvariantViolation::MissingRelatedCourse {
                    course: self.id.clone(),
                    level: self.level,
                })
            }
            (CourseLevel::Initial | CourseLevel::Professional, Some(_)) => {
                Err(InvariantViolation::UnexpectedRelatedCourse {
                    course: self.id.clone(),
                    level: self.level,
                })
            }
            _ => Ok(()),
        }
    }

    /// The course whose certification lineage this offering belongs to.
    pub fn lineage_root(&self) -> CourseId {
        self.related_course_id
            .clone()
            .unwrap_or_else(|| self.id.clone())
    }
}

/// A cohort of trainees inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingClass {
    pub id: ClassId,
    pub course_id: CourseId,
    pub name: String,
}

/// The unit of scheduling: one subject taught to one class by one instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSubject {
    pub id: ClassSubjectId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub specialty_id: SpecialtyId,
}

/// Approved pairing of an instructor with a class subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorAssignment {
    pub class_subject_id: ClassSubjectId,
    pub instructor_id: UserId,
}

/// Instructor master data consulted during schedule validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub id: UserId,
    pub full_name: String,
    pub specialty_id: SpecialtyId,
}

/// Trainee master data consulted for certificates and grade import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineeProfile {
    pub id: TraineeId,
    pub full_name: String,
    pub email: String,
}

/// A subject with the passing threshold applied to its grades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    pub passing_score: f32,
}

/// Generic approval state gating mutation of approved entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Updating,
    Deleting,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Updating => "updating",
            RequestStatus::Deleting => "deleting",
        }
    }
}

/// Links a trainee to a class subject, gated by approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineeAssign {
    pub id: TraineeAssignId,
    pub trainee_id: TraineeId,
    pub class_subject_id: ClassSubjectId,
    pub status: RequestStatus,
}

/// Lifecycle of a training schedule once proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Pending,
    Incoming,
    Canceled,
    Completed,
}

impl ScheduleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Incoming => "incoming",
            ScheduleStatus::Canceled => "canceled",
            ScheduleStatus::Completed => "completed",
        }
    }

    /// Closed schedules no longer block course completion.
    pub const fn is_closed(self) -> bool {
        matches!(self, ScheduleStatus::Canceled | ScheduleStatus::Completed)
    }
}

/// Daily start times a session may occupy.
pub const ALLOWED_CLASS_HOURS: [u32; 12] = [7, 8, 9, 10, 11, 13, 14, 15, 16, 18, 19, 20];

/// Session length bounds in minutes.
pub const MIN_SESSION_MINUTES: u32 = 80;
pub const MAX_SESSION_MINUTES: u32 = 170;

pub fn is_allowed_class_time(time: NaiveTime) -> bool {
    ALLOWED_CLASS_HOURS
        .iter()
        .any(|hour| NaiveTime::from_hms_opt(*hour, 0, 0) == Some(time))
}

/// A repeating session plan for one class subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSchedule {
    pub id: ScheduleId,
    pub class_subject_id: ClassSubjectId,
    pub instructor_id: UserId,
    pub teaching_days: BTreeSet<Weekday>,
    pub class_time: NaiveTime,
    pub duration_minutes: u32,
    pub start_day: NaiveDate,
    pub end_day: NaiveDate,
    pub location: String,
    pub room: String,
    pub status: ScheduleStatus,
}

impl TrainingSchedule {
    /// Daily occupation as a half-open `[start, end)` interval.
    pub fn time_interval(&self) -> (NaiveTime, NaiveTime) {
        let end = self.class_time + Duration::minutes(i64::from(self.duration_minutes));
        (self.class_time, end)
    }
}

/// Component scores recorded for one trainee in one subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeComponents {
    pub participation: f32,
    pub assignment: f32,
    pub final_exam: f32,
    pub resit: Option<f32>,
}

/// Pass/fail state derived from the component scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeStatus {
    Pass,
    Fail,
    Pending,
}

impl GradeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            GradeStatus::Pass => "pass",
            GradeStatus::Fail => "fail",
            GradeStatus::Pending => "pending",
        }
    }
}

/// One grade per (assignment, subject), with the aggregated total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub trainee_assign_id: TraineeAssignId,
    pub subject_id: SubjectId,
    pub components: GradeComponents,
    pub total: f32,
    pub status: GradeStatus,
}

/// Lifecycle of an issued certificate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    Pending,
    Active,
    Expired,
    Revoked,
}

impl CertificateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Active => "active",
            CertificateStatus::Expired => "expired",
            CertificateStatus::Revoked => "revoked",
        }
    }
}

/// Revocation metadata retained on the certificate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_on: NaiveDate,
    pub revoked_by: UserId,
    pub reason: String,
}

/// A validity extension applied to an existing certificate.
///
/// Renewals mutate the certificate row in place; the event keeps the history
/// reconstructable without inferring it from timestamps alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalEvent {
    pub renewed_on: NaiveDate,
    pub previous_issued_on: NaiveDate,
    pub previous_expiry: NaiveDate,
    pub new_expiry: NaiveDate,
    pub issued_by: UserId,
    pub course_id: CourseId,
}

/// A certificate row; created once per (trainee, course lineage) and renewed
/// in place afterwards. Rows are never deleted, only marked revoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub code: String,
    pub trainee_id: TraineeId,
    pub course_id: CourseId,
    pub template_id: Option<TemplateId>,
    pub specialty_id: SpecialtyId,
    pub status: CertificateStatus,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub issued_by: UserId,
    pub document_url: Option<String>,
    pub revocation: Option<Revocation>,
    pub history: Vec<RenewalEvent>,
}

/// Certificate template; the highest active sequence per name prefix wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTemplate {
    pub id: TemplateId,
    pub name: String,
    pub sequence: u32,
    pub active: bool,
    pub body: String,
}

/// Administrative sign-off recorded once per qualifying course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub course_id: CourseId,
    pub certificate_id: Option<CertificateId>,
    pub signed_by: UserId,
    pub issued_on: NaiveDate,
}

/// Entity kinds an approval request can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Course,
    TrainingPlan,
    Schedule,
    Assignment,
}

/// Generic approval envelope gating mutation of approved entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
    pub entity_id: String,
    pub status: RequestStatus,
    pub requested_by: UserId,
    pub approver: Option<UserId>,
}

/// Cross-entity consistency failures surfaced as warnings, not aborts.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvariantViolation {
    #[error("course {course:?} is {level:?} but carries a related course reference")]
    UnexpectedRelatedCourse { course: CourseId, level: CourseLevel },
    #[error("course {course:?} is {level:?} and must reference the initial course it renews")]
    MissingRelatedCourse { course: CourseId, level: CourseLevel },
}
