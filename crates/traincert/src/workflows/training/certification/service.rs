use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::super::domain::{
    Certificate, CertificateId, CertificateStatus, Course, CourseId, CourseLevel, CourseStatus,
    Decision, DecisionId, Grade, InvariantViolation, RenewalEvent, SpecialtyId, TraineeAssign,
    TraineeId, UserId,
};
use super::super::gateway::{
    DocumentStore, Notification, NotificationCategory, NotificationSink, TemplateRenderer,
};
use super::super::repository::{
    with_retries, CertificateMutation, CertificateRepository, CourseRepository,
    DecisionRepository, GradeRepository, PeopleRepository, RepositoryError, RosterRepository,
    TemplateRepository,
};
use super::eligibility::{
    evaluate, EligibilityContext, EligibilityDecision, SkipReason, TraineeEligibility,
};
use super::grading::average_total;
use super::templates::{certificate_substitutions, resolve_template, TemplateError};

/// Concurrent render/upload and notification tasks per batch.
const BATCH_CONCURRENCY: usize = 10;

/// Validity granted to freshly issued and renewed certificates.
const NEW_CERTIFICATE_VALIDITY_MONTHS: u32 = 36;
const RENEWAL_VALIDITY_MONTHS: u32 = 24;

const CERTIFICATE_CONTAINER: &str = "certificates";

static CERTIFICATE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_certificate_identity() -> (CertificateId, String) {
    let id = CERTIFICATE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (
        CertificateId(format!("cert-{id:06}")),
        format!("VTC-{id:06}"),
    )
}

/// A trainee excluded from the batch, with the reason itemized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrainee {
    pub trainee_id: TraineeId,
    pub reason: SkipReason,
}

/// Batch result: certificates written plus every exclusion, never
/// all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateBatchOutcome {
    pub course_id: CourseId,
    pub issued: Vec<Certificate>,
    pub renewed: Vec<Certificate>,
    pub skipped: Vec<SkippedTrainee>,
}

/// Error raised before any certificate row is touched.
#[derive(Debug, thiserror::Error)]
pub enum CertificationError {
    #[error("course not found")]
    CourseNotFound,
    #[error("course is not approved")]
    CourseNotApproved,
    #[error("course has no subject specialties configured")]
    NoSubjectsConfigured,
    #[error(transparent)]
    Lineage(#[from] InvariantViolation),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Batch engine turning recorded grades into issued or renewed certificates.
pub struct CertificationService<R, D, N> {
    repository: Arc<R>,
    documents: Arc<D>,
    notifications: Arc<N>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl<R, D, N> CertificationService<R, D, N>
where
    R: CourseRepository
        + RosterRepository
        + GradeRepository
        + CertificateRepository
        + TemplateRepository
        + DecisionRepository
        + PeopleRepository
        + 'static,
    D: DocumentStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        repository: Arc<R>,
        documents: Arc<D>,
        notifications: Arc<N>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            repository,
            documents,
            notifications,
            renderer,
        }
    }

    /// Issue or renew certificates for every qualifying trainee of a course.
    ///
    /// Per-trainee failures are itemized and excluded; the surviving rows
    /// commit in one transaction.
    pub async fn issue_for_course(
        &self,
        course_id: &CourseId,
        issued_by: &UserId,
        today: NaiveDate,
    ) -> Result<CertificateBatchOutcome, CertificationError> {
        let course = self
            .repository
            .course(course_id)?
            .ok_or(CertificationError::CourseNotFound)?;
        if course.status != CourseStatus::Approved {
            return Err(CertificationError::CourseNotApproved);
        }
        if course.subject_specialties.is_empty() {
            return Err(CertificationError::NoSubjectsConfigured);
        }
        course.check_lineage()?;

        let templates = self.repository.active_templates()?;
        let template = resolve_template(course.level, &templates)?.clone();

        let assigns = self.repository.assigns_for_course(course_id)?;
        let class_subjects = self.repository.class_subjects(course_id)?;
        let mut grades: Vec<Grade> = Vec::new();
        for assign in &assigns {
            grades.extend(self.repository.grades_for_assign(&assign.id)?);
        }

        let mut existing_certificates = Vec::new();
        let mut seen_trainees = std::collections::BTreeSet::new();
        for assign in &assigns {
            if seen_trainees.insert(assign.trainee_id.clone()) {
                existing_certificates
                    .extend(self.repository.certificates_for_trainee(&assign.trainee_id)?);
            }
        }

        let rulings = evaluate(&EligibilityContext {
            course: &course,
            assigns: &assigns,
            class_subjects: &class_subjects,
            grades: &grades,
            existing_certificates: &existing_certificates,
        });

        let mut skipped = Vec::new();
        let mut eligible = Vec::new();
        for TraineeEligibility {
            trainee_id,
            decision,
        } in rulings
        {
            match decision {
                EligibilityDecision::Eligible { specialty } => {
                    eligible.push((trainee_id, specialty));
                }
                EligibilityDecision::Skipped(reason) => {
                    skipped.push(SkippedTrainee { trainee_id, reason });
                }
            }
        }

        let mut mutations: Vec<CertificateMutation> = Vec::new();
        let mut renewed_ids = std::collections::BTreeSet::new();

        if course.level == CourseLevel::Recurrent {
            let related = course
                .related_course_id
                .clone()
                .expect("lineage checked above");
            for (trainee_id, specialty) in eligible {
                match self.repository.active_certificate(&trainee_id, &related)? {
                    Some(current) => {
                        let event = RenewalEvent {
                            renewed_on: today,
                            previous_issued_on: current.issued_on,
                            previous_expiry: current.expires_on,
                            new_expiry: today + Months::new(RENEWAL_VALIDITY_MONTHS),
                            issued_by: issued_by.clone(),
                            course_id: course.id.clone(),
                        };
                        renewed_ids.insert(current.id.clone());
                        mutations.push(CertificateMutation::Renew {
                            id: current.id,
                            course_id: course.id.clone(),
                            specialty_id: specialty,
                            event,
                        });
                    }
                    None => {
                        tracing::warn!(
                            trainee = %trainee_id.0,
                            course = %related.0,
                            "no active certificate to renew, skipping trainee"
                        );
                        skipped.push(SkippedTrainee {
                            trainee_id,
                            reason: SkipReason::NoRenewableCertificate { course: related.clone() },
                        });
                    }
                }
            }
        } else {
            let rendered = self
                .render_batch(&course, &eligible, &assigns, &grades, issued_by, today, &template.body)
                .await;
            for result in rendered {
                match result {
                    Ok(mut certificate) => {
                        certificate.template_id = Some(template.id.clone());
                        mutations.push(CertificateMutation::Create(certificate));
                    }
                    Err((trainee_id, reason)) => {
                        tracing::warn!(trainee = %trainee_id.0, %reason, "certificate rendering failed");
                        skipped.push(SkippedTrainee {
                            trainee_id,
                            reason: SkipReason::Failed { reason },
                        });
                    }
                }
            }
        }

        let committed = if mutations.is_empty() {
            Vec::new()
        } else {
            with_retries(|| self.repository.commit_batch(mutations.clone()))?
        };

        let (renewed, issued): (Vec<Certificate>, Vec<Certificate>) = committed
            .into_iter()
            .partition(|certificate| renewed_ids.contains(&certificate.id));

        if !issued.is_empty() || !renewed.is_empty() {
            self.record_decision(&course, issued_by, today)?;
        }
        self.dispatch_notifications(&course, &issued, &renewed, issued_by)
            .await;

        Ok(CertificateBatchOutcome {
            course_id: course.id,
            issued,
            renewed,
            skipped,
        })
    }

    /// Render and upload one artifact per eligible trainee, at most
    /// [`BATCH_CONCURRENCY`] in flight; every task finishes before the batch
    /// proceeds to its commit.
    #[allow(clippy::too_many_arguments)]
    async fn render_batch(
        &self,
        course: &Course,
        eligible: &[(TraineeId, SpecialtyId)],
        assigns: &[TraineeAssign],
        grades: &[Grade],
        issued_by: &UserId,
        today: NaiveDate,
        template_body: &str,
    ) -> Vec<Result<Certificate, (TraineeId, String)>> {
        let limit = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
        let mut handles = Vec::new();

        for (trainee_id, specialty) in eligible.iter().cloned() {
            let profile = match self.repository.trainee(&trainee_id) {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    handles.push(Err((trainee_id, "trainee profile missing".to_string())));
                    continue;
                }
                Err(error) => {
                    handles.push(Err((trainee_id, error.to_string())));
                    continue;
                }
            };

            let trainee_assigns: Vec<_> = assigns
                .iter()
                .filter(|assign| assign.trainee_id == trainee_id)
                .map(|assign| assign.id.clone())
                .collect();
            let trainee_grades: Vec<&Grade> = grades
                .iter()
                .filter(|grade| trainee_assigns.contains(&grade.trainee_assign_id))
                .collect();
            let average = average_total(&trainee_grades);

            let permit = limit
                .clone()
                .acquire_owned()
                .await
                .expect("render semaphore closed");
            let documents = self.documents.clone();
            let renderer = self.renderer.clone();
            let course = course.clone();
            let issued_by = issued_by.clone();
            let body = template_body.to_string();

            handles.push(Ok(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let (certificate_id, code) = next_certificate_identity();
                let substitutions =
                    certificate_substitutions(&profile, &course, &code, today, average);
                let rendered = renderer.render(&body, &substitutions);

                let url = documents
                    .upload(
                        CERTIFICATE_CONTAINER,
                        &format!("{code}.html"),
                        rendered.into_bytes(),
                        "text/html",
                    )
                    .map_err(|error| (profile.id.clone(), error.to_string()))?;

                Ok(Certificate {
                    id: certificate_id,
                    code,
                    trainee_id: profile.id,
                    course_id: course.id.clone(),
                    template_id: None,
                    specialty_id: specialty,
                    status: CertificateStatus::Pending,
                    issued_on: today,
                    expires_on: today + Months::new(NEW_CERTIFICATE_VALIDITY_MONTHS),
                    issued_by,
                    document_url: Some(url),
                    revocation: None,
                    history: Vec::new(),
                })
            })));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Ok(join) => match join.await {
                    Ok(result) => results.push(result),
                    Err(error) => {
                        tracing::error!(%error, "certificate render task aborted");
                    }
                },
                Err(skip) => results.push(Err(skip)),
            }
        }
        results
    }

    fn record_decision(
        &self,
        course: &Course,
        signed_by: &UserId,
        today: NaiveDate,
    ) -> Result<(), CertificationError> {
        if self.repository.decision_for_course(&course.id)?.is_some() {
            return Ok(());
        }

        let decision = Decision {
            id: DecisionId(format!("dec-{}", course.id.0)),
            course_id: course.id.clone(),
            certificate_id: None,
            signed_by: signed_by.clone(),
            issued_on: today,
        };
        with_retries(|| self.repository.insert_decision(decision.clone()))?;
        Ok(())
    }

    /// Post-commit notification fan-out; failures are logged and skipped so
    /// one unreachable user never blocks the batch result.
    async fn dispatch_notifications(
        &self,
        course: &Course,
        issued: &[Certificate],
        renewed: &[Certificate],
        issued_by: &UserId,
    ) {
        let limit = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
        let mut handles = Vec::new();

        for certificate in issued.iter().chain(renewed) {
            let permit = limit
                .clone()
                .acquire_owned()
                .await
                .expect("notification semaphore closed");
            let notifications = self.notifications.clone();
            let notification = Notification {
                user_id: UserId(certificate.trainee_id.0.clone()),
                title: "Certificate updated".to_string(),
                body: format!(
                    "Certificate {} for course {} is awaiting activation.",
                    certificate.code, course.name
                ),
                category: NotificationCategory::CertificateIssued,
            };
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                if let Err(error) = notifications.notify(notification) {
                    tracing::warn!(%error, "trainee notification failed");
                }
            }));
        }

        for handle in handles {
            if let Err(error) = handle.await {
                tracing::error!(%error, "notification task aborted");
            }
        }

        let signoff = Notification {
            user_id: issued_by.clone(),
            title: "Certificates awaiting sign-off".to_string(),
            body: format!(
                "{} issued and {} renewed certificates for course {} need a decision.",
                issued.len(),
                renewed.len(),
                course.name
            ),
            category: NotificationCategory::DecisionSignoff,
        };
        if let Err(error) = self.notifications.notify(signoff) {
            tracing::warn!(%error, "sign-off notification failed");
        }
    }
}
