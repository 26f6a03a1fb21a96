//! Course progress state machine: `NotYet -> Ongoing -> Completed`, driven by
//! time and by completion predicates over child schedules and grades.

pub mod machine;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use machine::{
    next_progress, ClassSubjectActivity, CourseActivitySnapshot, TraineeActivity,
};
pub use sweep::{ProgressSweep, SweepOutcome};
