//! Training lifecycle and certification engine: schedule validation, course
//! progress, certificate eligibility and renewal, and the renewal history
//! read path.

pub mod certification;
pub mod domain;
pub mod gateway;
pub mod progress;
pub mod repository;
pub mod scheduling;

pub use certification::{
    CertificateBatchOutcome, CertificateHistoryService, CertificationError, CertificationRoutes,
    CertificationService, ExpirySweep, RenewalHistory,
};
pub use progress::{CourseActivitySnapshot, ProgressSweep};
pub use scheduling::{ScheduleDraft, ScheduleRejection, ScheduleService, ScheduleServiceError};
