use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::super::domain::{CertificateTemplate, Course, CourseLevel, TraineeProfile};
use super::grading::GradeTier;

/// Template lookup failure; fails the whole batch before any row is touched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("no active certificate template with name prefix {prefix:?}")]
    MissingTemplate { prefix: String },
}

/// Primary template name prefix per course level. Relearn courses fall back
/// to the Initial prefix when no Relearn template is active.
fn template_prefix(level: CourseLevel) -> &'static str {
    match level {
        CourseLevel::Initial | CourseLevel::Recurrent => "Initial",
        CourseLevel::Relearn => "Relearn",
        CourseLevel::Professional => "Professional",
    }
}

fn best_with_prefix<'a>(
    templates: &'a [CertificateTemplate],
    prefix: &str,
) -> Option<&'a CertificateTemplate> {
    templates
        .iter()
        .filter(|template| template.active && template.name.starts_with(prefix))
        .max_by_key(|template| template.sequence)
}

/// Pick the template for a course level: the active template with the
/// highest sequence among those sharing the level's name prefix.
pub fn resolve_template(
    level: CourseLevel,
    templates: &[CertificateTemplate],
) -> Result<&CertificateTemplate, TemplateError> {
    let prefix = template_prefix(level);
    if let Some(template) = best_with_prefix(templates, prefix) {
        return Ok(template);
    }

    if level == CourseLevel::Relearn {
        if let Some(template) = best_with_prefix(templates, "Initial") {
            return Ok(template);
        }
    }

    Err(TemplateError::MissingTemplate {
        prefix: prefix.to_string(),
    })
}

/// Substitution map handed to the renderer; keys mirror the placeholders the
/// template bodies use.
pub fn certificate_substitutions(
    trainee: &TraineeProfile,
    course: &Course,
    certificate_code: &str,
    issued_on: NaiveDate,
    average_score: f32,
) -> BTreeMap<String, String> {
    let mut substitutions = BTreeMap::new();
    substitutions.insert("trainee_name".to_string(), trainee.full_name.clone());
    substitutions.insert("course_name".to_string(), course.name.clone());
    substitutions.insert("course_level".to_string(), course.level.label().to_string());
    substitutions.insert(
        "certificate_code".to_string(),
        certificate_code.to_string(),
    );
    substitutions.insert(
        "issue_date".to_string(),
        issued_on.format("%Y-%m-%d").to_string(),
    );
    substitutions.insert(
        "grade_tier".to_string(),
        GradeTier::from_average(average_score).label().to_string(),
    );
    substitutions.insert(
        "average_score".to_string(),
        format!("{average_score:.1}"),
    );
    substitutions
}
