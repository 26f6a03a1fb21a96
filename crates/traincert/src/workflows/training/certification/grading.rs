use serde::{Deserialize, Serialize};

use super::super::domain::{Grade, GradeComponents, GradeStatus, Subject, TraineeAssignId};

/// Weighted total over the component scores, clamped to the grading scale.
///
/// A positive resit score replaces the final exam entirely.
pub fn aggregate_total(components: &GradeComponents) -> f32 {
    let exam = match components.resit {
        Some(resit) if resit > 0.0 => resit,
        _ => components.final_exam,
    };
    let total = 0.1 * components.participation + 0.3 * components.assignment + 0.6 * exam;
    total.clamp(0.0, 10.0)
}

/// Pass/fail ruling: a zero participation or assignment score fails outright,
/// otherwise the weighted total is held against the subject's threshold.
pub fn grade_status(components: &GradeComponents, passing_score: f32) -> GradeStatus {
    if components.participation == 0.0 || components.assignment == 0.0 {
        return GradeStatus::Fail;
    }
    if aggregate_total(components) >= passing_score {
        GradeStatus::Pass
    } else {
        GradeStatus::Fail
    }
}

/// Build the stored grade row for an assignment in one subject.
pub fn build_grade(
    assign: TraineeAssignId,
    subject: &Subject,
    components: GradeComponents,
) -> Grade {
    Grade {
        trainee_assign_id: assign,
        subject_id: subject.id.clone(),
        total: aggregate_total(&components),
        status: grade_status(&components, subject.passing_score),
        components,
    }
}

/// Average of grade totals, used to pick the certificate wording.
pub fn average_total(grades: &[&Grade]) -> f32 {
    if grades.is_empty() {
        return 0.0;
    }
    grades.iter().map(|grade| grade.total).sum::<f32>() / grades.len() as f32
}

/// Wording tier printed on the certificate, derived from the average total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeTier {
    Excellent,
    VeryGood,
    Good,
    Pass,
}

impl GradeTier {
    pub fn from_average(average: f32) -> Self {
        if average >= 9.0 {
            GradeTier::Excellent
        } else if average >= 8.0 {
            GradeTier::VeryGood
        } else if average >= 6.5 {
            GradeTier::Good
        } else {
            GradeTier::Pass
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            GradeTier::Excellent => "Excellent",
            GradeTier::VeryGood => "Very Good",
            GradeTier::Good => "Good",
            GradeTier::Pass => "Pass",
        }
    }
}
