use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{
    Certificate, CertificateId, CertificateStatus, Course, CourseId, CourseLevel, UserId,
};
use super::super::repository::{CertificateRepository, CourseRepository, RepositoryError};

/// Sibling issues closer together than this are only renewals when the course
/// changed; same-course reissues need a year between them or an expiring
/// predecessor.
const SAME_COURSE_RENEWAL_GAP_DAYS: i64 = 365;
const EXPIRY_PROXIMITY_DAYS: i64 = 180;

/// Metadata of the first issuance in a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalIssue {
    pub certificate_id: CertificateId,
    pub course_id: CourseId,
    pub issued_on: NaiveDate,
}

/// One detected validity extension within a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalRecord {
    pub renewed_on: NaiveDate,
    pub previous_expiry: NaiveDate,
    pub new_expiry: NaiveDate,
    pub issued_by: UserId,
    pub course_id: CourseId,
}

/// Ordered renewal history of a certificate, newest first. A certificate with
/// no siblings and no recorded renewals reports its own issue metadata with
/// an empty list; a lineage with no surviving rows reports no original issue
/// at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalHistory {
    pub certificate_id: CertificateId,
    pub original: Option<OriginalIssue>,
    pub renewals: Vec<RenewalRecord>,
}

/// Error raised while resolving a renewal chain.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("certificate not found")]
    CertificateNotFound,
    #[error("course {0:?} referenced by the chain was not found")]
    CourseNotFound(CourseId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The issue date a row originally carried, before in-place renewals
/// restamped it.
fn first_issued_on(certificate: &Certificate) -> NaiveDate {
    certificate
        .history
        .first()
        .map(|event| event.previous_issued_on)
        .unwrap_or(certificate.issued_on)
}

/// Reconstruct the renewal history for `target` from every certificate the
/// trainee holds. Pure transform; all lookups happen through the maps given.
pub fn reconstruct(
    target: &Certificate,
    courses: &BTreeMap<CourseId, Course>,
    candidates: &[Certificate],
) -> Result<RenewalHistory, HistoryError> {
    let target_course = courses
        .get(&target.course_id)
        .ok_or_else(|| HistoryError::CourseNotFound(target.course_id.clone()))?;

    let original_course_id = if target_course.level == CourseLevel::Recurrent {
        target_course
            .related_course_id
            .clone()
            .unwrap_or_else(|| target_course.id.clone())
    } else {
        target_course.id.clone()
    };

    // Lineage membership: the original course itself, or any recurrent course
    // pointing back at it.
    let lineage_courses: BTreeSet<&CourseId> = courses
        .values()
        .filter(|course| {
            course.id == original_course_id
                || (course.level == CourseLevel::Recurrent
                    && course.related_course_id.as_ref() == Some(&original_course_id))
        })
        .map(|course| &course.id)
        .collect();

    let mut chain: Vec<&Certificate> = candidates
        .iter()
        .filter(|certificate| certificate.trainee_id == target.trainee_id)
        .filter(|certificate| certificate.status != CertificateStatus::Revoked)
        .filter(|certificate| lineage_courses.contains(&certificate.course_id))
        .collect();

    let mut seen = BTreeSet::new();
    chain.retain(|certificate| seen.insert(certificate.id.clone()));
    chain.sort_by(|a, b| {
        first_issued_on(a)
            .cmp(&first_issued_on(b))
            .then_with(|| a.id.cmp(&b.id))
    });

    let Some(earliest) = chain.first() else {
        return Ok(RenewalHistory {
            certificate_id: target.id.clone(),
            original: None,
            renewals: Vec::new(),
        });
    };

    let original = OriginalIssue {
        certificate_id: earliest.id.clone(),
        course_id: original_course_id,
        issued_on: first_issued_on(earliest),
    };

    let mut renewals: Vec<RenewalRecord> = Vec::new();

    // Renewals recorded on the rows themselves.
    for certificate in &chain {
        for event in &certificate.history {
            renewals.push(RenewalRecord {
                renewed_on: event.renewed_on,
                previous_expiry: event.previous_expiry,
                new_expiry: event.new_expiry,
                issued_by: event.issued_by.clone(),
                course_id: event.course_id.clone(),
            });
        }
    }

    // Renewals inferred from consecutive sibling rows.
    for pair in chain.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if is_renewal_pair(previous, current, courses) {
            renewals.push(RenewalRecord {
                renewed_on: current.issued_on,
                previous_expiry: previous.expires_on,
                new_expiry: current.expires_on,
                issued_by: current.issued_by.clone(),
                course_id: current.course_id.clone(),
            });
        }
    }

    let mut keys = BTreeSet::new();
    renewals.retain(|record| {
        keys.insert((
            record.renewed_on,
            record.course_id.clone(),
            record.new_expiry,
        ))
    });
    renewals.sort_by(|a, b| b.renewed_on.cmp(&a.renewed_on));

    Ok(RenewalHistory {
        certificate_id: target.id.clone(),
        original: Some(original),
        renewals,
    })
}

fn is_renewal_pair(
    previous: &Certificate,
    current: &Certificate,
    courses: &BTreeMap<CourseId, Course>,
) -> bool {
    if current.course_id != previous.course_id {
        return courses
            .get(&current.course_id)
            .map(|course| course.level == CourseLevel::Recurrent)
            .unwrap_or(false);
    }

    let gap = (current.issued_on - previous.issued_on).num_days();
    let expiry_proximity = (previous.expires_on - current.issued_on).num_days().abs();
    gap > SAME_COURSE_RENEWAL_GAP_DAYS || expiry_proximity <= EXPIRY_PROXIMITY_DAYS
}

/// Read-path facade loading the trainee's rows and course lineage before
/// delegating to the pure reconstruction.
pub struct CertificateHistoryService<R> {
    repository: Arc<R>,
}

impl<R> CertificateHistoryService<R>
where
    R: CertificateRepository + CourseRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn history(&self, id: &CertificateId) -> Result<RenewalHistory, HistoryError> {
        let target = self
            .repository
            .certificate(id)?
            .ok_or(HistoryError::CertificateNotFound)?;
        let candidates = self.repository.certificates_for_trainee(&target.trainee_id)?;

        let mut courses = BTreeMap::new();
        for certificate in candidates.iter().chain(std::iter::once(&target)) {
            if courses.contains_key(&certificate.course_id) {
                continue;
            }
            if let Some(course) = self.repository.course(&certificate.course_id)? {
                // Pull the lineage root in as well so membership checks see it.
                if let Some(related) = &course.related_course_id {
                    if !courses.contains_key(related) {
                        if let Some(root) = self.repository.course(related)? {
                            courses.insert(root.id.clone(), root);
                        }
                    }
                }
                courses.insert(course.id.clone(), course);
            }
        }

        reconstruct(&target, &courses, &candidates)
    }
}
