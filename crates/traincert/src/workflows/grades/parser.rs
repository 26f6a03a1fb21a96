use std::io::Read;

use serde::Deserialize;

use super::normalizer::normalize_key;
use crate::workflows::training::domain::GradeComponents;

/// One successfully parsed score sheet row, keys already normalized.
#[derive(Debug)]
pub(crate) struct GradeRecord {
    pub(crate) line: u64,
    pub(crate) trainee_email: String,
    pub(crate) subject_code: String,
    pub(crate) components: GradeComponents,
}

#[derive(Debug, Deserialize)]
struct GradeRow {
    #[serde(rename = "Trainee Email")]
    trainee_email: String,
    #[serde(rename = "Subject Code")]
    subject_code: String,
    #[serde(rename = "Participation")]
    participation: f32,
    #[serde(rename = "Assignment")]
    assignment: f32,
    #[serde(rename = "Final Exam")]
    final_exam: f32,
    #[serde(rename = "Resit", default)]
    resit: Option<f32>,
}

/// Parse every row, keeping malformed ones as itemized issues instead of
/// aborting the sheet.
pub(crate) fn parse_records<R: Read>(reader: R) -> Vec<Result<GradeRecord, (u64, String)>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize::<GradeRow>()
        .enumerate()
        .map(|(index, record)| {
            // Header occupies the first line.
            let line = index as u64 + 2;
            match record {
                Ok(row) => validate_row(line, row),
                Err(error) => Err((line, error.to_string())),
            }
        })
        .collect()
}

fn validate_row(line: u64, row: GradeRow) -> Result<GradeRecord, (u64, String)> {
    let scores = [
        ("Participation", row.participation),
        ("Assignment", row.assignment),
        ("Final Exam", row.final_exam),
        ("Resit", row.resit.unwrap_or(0.0)),
    ];
    for (label, score) in scores {
        if !(0.0..=10.0).contains(&score) {
            return Err((line, format!("{label} score {score} outside 0..=10")));
        }
    }

    if row.trainee_email.trim().is_empty() {
        return Err((line, "trainee email is empty".to_string()));
    }
    if row.subject_code.trim().is_empty() {
        return Err((line, "subject code is empty".to_string()));
    }

    Ok(GradeRecord {
        line,
        trainee_email: normalize_key(&row.trainee_email),
        subject_code: normalize_key(&row.subject_code),
        components: GradeComponents {
            participation: row.participation,
            assignment: row.assignment,
            final_exam: row.final_exam,
            resit: row.resit,
        },
    })
}
