//! Certificate eligibility, issuance, renewal-in-place, expiry, and renewal
//! chain reconstruction.

pub mod eligibility;
pub mod expiry;
pub mod grading;
pub mod history;
pub mod router;
pub mod service;
pub mod templates;

#[cfg(test)]
mod tests;

pub use eligibility::{EligibilityDecision, SkipReason, TraineeEligibility};
pub use expiry::{ExpiryOutcome, ExpirySweep};
pub use grading::{aggregate_total, build_grade, grade_status, GradeTier};
pub use history::{
    CertificateHistoryService, HistoryError, OriginalIssue, RenewalHistory, RenewalRecord,
};
pub use router::{certification_router, CertificationRoutes};
pub use service::{
    CertificateBatchOutcome, CertificationError, CertificationService, SkippedTrainee,
};
pub use templates::{resolve_template, TemplateError};
