//! CSV score sheet import: parse rows, match them to approved assignments,
//! and aggregate totals. The report itemizes every rejected row; one bad row
//! never discards the sheet.

mod mapping;
mod normalizer;
mod parser;

pub use mapping::RosterIndex;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::workflows::training::certification::grading::build_grade;
use crate::workflows::training::domain::Grade;

/// Sheet-level import failure; row-level problems go into the report instead.
#[derive(Debug)]
pub enum GradeImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for GradeImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradeImportError::Io(err) => write!(f, "failed to read grade sheet: {}", err),
            GradeImportError::Csv(err) => write!(f, "invalid grade sheet data: {}", err),
        }
    }
}

impl std::error::Error for GradeImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GradeImportError::Io(err) => Some(err),
            GradeImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for GradeImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for GradeImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// A rejected or suspicious row, by sheet line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub message: String,
}

/// Partial-success result of one sheet import.
#[derive(Debug, Default, Serialize)]
pub struct GradeImportReport {
    pub imported: Vec<Grade>,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

pub struct GradeCsvImporter;

impl GradeCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        roster: &RosterIndex,
    ) -> Result<GradeImportReport, GradeImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, roster)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        roster: &RosterIndex,
    ) -> Result<GradeImportReport, GradeImportError> {
        let mut report = GradeImportReport::default();
        let mut applied: HashSet<(String, String)> = HashSet::new();

        for record in parser::parse_records(reader) {
            let record = match record {
                Ok(record) => record,
                Err((line, message)) => {
                    report.errors.push(RowIssue { line, message });
                    continue;
                }
            };

            let key = (record.trainee_email.clone(), record.subject_code.clone());
            if !applied.insert(key) {
                report.warnings.push(RowIssue {
                    line: record.line,
                    message: format!(
                        "duplicate row for {} / {}; first occurrence kept",
                        record.trainee_email, record.subject_code
                    ),
                });
                continue;
            }

            match roster.lookup(&record.trainee_email, &record.subject_code) {
                Some((assign_id, subject)) => {
                    report
                        .imported
                        .push(build_grade(assign_id.clone(), subject, record.components));
                }
                None => {
                    report.errors.push(RowIssue {
                        line: record.line,
                        message: format!(
                            "no approved assignment matches {} / {}",
                            record.trainee_email, record.subject_code
                        ),
                    });
                }
            }
        }

        Ok(report)
    }
}
