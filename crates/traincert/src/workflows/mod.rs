pub mod grades;
pub mod training;
