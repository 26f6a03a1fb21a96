use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::super::domain::{
    Certificate, CertificateId, CertificateStatus, ClassSubject, ClassSubjectId, Course, CourseId,
    Grade, GradeStatus, RequestStatus, SpecialtyId, SubjectId, TraineeAssign, TraineeId,
};

/// Why a trainee was left out of a certificate batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    MixedSpecialties { specialties: BTreeSet<SpecialtyId> },
    MissingPassingGrade { subject: SubjectId },
    AlreadyCertified { certificate: CertificateId },
    NoRenewableCertificate { course: CourseId },
    Failed { reason: String },
}

impl SkipReason {
    pub fn summary(&self) -> String {
        match self {
            SkipReason::MixedSpecialties { specialties } => format!(
                "assignments span {} specialties; exactly one is required",
                specialties.len()
            ),
            SkipReason::MissingPassingGrade { subject } => {
                format!("no passing grade recorded for subject {}", subject.0)
            }
            SkipReason::AlreadyCertified { certificate } => {
                format!("certificate {} already covers this course", certificate.0)
            }
            SkipReason::NoRenewableCertificate { course } => {
                format!("no active certificate for course {} to renew", course.0)
            }
            SkipReason::Failed { reason } => format!("processing failed: {reason}"),
        }
    }
}

/// Per-trainee ruling produced by the eligibility pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EligibilityDecision {
    Eligible { specialty: SpecialtyId },
    Skipped(SkipReason),
}

/// A trainee together with the ruling over their assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraineeEligibility {
    pub trainee_id: TraineeId,
    pub decision: EligibilityDecision,
}

/// Inputs the eligibility pass consults; all reads happen before judging so
/// the pass itself is a pure transform.
#[derive(Debug)]
pub struct EligibilityContext<'a> {
    pub course: &'a Course,
    pub assigns: &'a [TraineeAssign],
    pub class_subjects: &'a [ClassSubject],
    pub grades: &'a [Grade],
    pub existing_certificates: &'a [Certificate],
}

/// Judge every trainee with approved assignments in the course.
///
/// A trainee qualifies when their assignments sit in exactly one specialty,
/// every subject the course requires for that specialty carries a passing
/// grade, and no live certificate already covers this exact course.
pub fn evaluate(context: &EligibilityContext<'_>) -> Vec<TraineeEligibility> {
    let class_subjects: BTreeMap<_, _> = context
        .class_subjects
        .iter()
        .map(|class_subject| (&class_subject.id, class_subject))
        .collect();

    let mut by_trainee: BTreeMap<&TraineeId, Vec<&TraineeAssign>> = BTreeMap::new();
    for assign in context
        .assigns
        .iter()
        .filter(|assign| assign.status == RequestStatus::Approved)
    {
        by_trainee.entry(&assign.trainee_id).or_default().push(assign);
    }

    by_trainee
        .into_iter()
        .map(|(trainee_id, assigns)| TraineeEligibility {
            trainee_id: trainee_id.clone(),
            decision: judge_trainee(context, &class_subjects, trainee_id, &assigns),
        })
        .collect()
}

fn judge_trainee(
    context: &EligibilityContext<'_>,
    class_subjects: &BTreeMap<&ClassSubjectId, &ClassSubject>,
    trainee_id: &TraineeId,
    assigns: &[&TraineeAssign],
) -> EligibilityDecision {
    let specialties: BTreeSet<SpecialtyId> = assigns
        .iter()
        .filter_map(|assign| class_subjects.get(&assign.class_subject_id))
        .map(|class_subject| class_subject.specialty_id.clone())
        .collect();

    if specialties.len() != 1 {
        return EligibilityDecision::Skipped(SkipReason::MixedSpecialties { specialties });
    }
    let specialty = specialties
        .into_iter()
        .next()
        .expect("exactly one specialty after the length check");

    let required: BTreeSet<&SubjectId> = context
        .course
        .subject_specialties
        .iter()
        .filter(|pair| pair.specialty_id == specialty)
        .map(|pair| &pair.subject_id)
        .collect();

    for subject in required {
        let passed = assigns.iter().any(|assign| {
            context.grades.iter().any(|grade| {
                grade.trainee_assign_id == assign.id
                    && &grade.subject_id == subject
                    && grade.status == GradeStatus::Pass
            })
        });
        if !passed {
            return EligibilityDecision::Skipped(SkipReason::MissingPassingGrade {
                subject: subject.clone(),
            });
        }
    }

    if let Some(existing) = context.existing_certificates.iter().find(|certificate| {
        certificate.trainee_id == *trainee_id
            && certificate.course_id == context.course.id
            && certificate.status != CertificateStatus::Revoked
    }) {
        return EligibilityDecision::Skipped(SkipReason::AlreadyCertified {
            certificate: existing.id.clone(),
        });
    }

    EligibilityDecision::Eligible { specialty }
}
