//! Schedule proposal validation: an ordered table of named predicate rules
//! judging room, instructor, and specialty constraints before anything is
//! persisted.

pub mod router;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use router::schedule_router;
pub use rules::{RuleContext, ScheduleDraft, ScheduleRejection};
pub use service::{ScheduleService, ScheduleServiceError};
