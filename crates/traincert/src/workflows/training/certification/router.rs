use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::super::domain::{Certificate, CertificateId, CourseId, UserId};
use super::super::gateway::{DocumentStore, NotificationSink};
use super::super::repository::{
    CertificateRepository, CourseRepository, DecisionRepository, GradeRepository,
    PeopleRepository, RosterRepository, TemplateRepository,
};
use super::history::{CertificateHistoryService, HistoryError};
use super::service::{CertificateBatchOutcome, CertificationError, CertificationService};

/// State shared by the certification endpoints.
pub struct CertificationRoutes<R, D, N> {
    pub certification: CertificationService<R, D, N>,
    pub history: CertificateHistoryService<R>,
}

/// Router builder exposing batch issuance and renewal history lookups.
pub fn certification_router<R, D, N>(routes: Arc<CertificationRoutes<R, D, N>>) -> Router
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
    Router::new()
        .route(
            "/api/v1/training/courses/:course_id/certificates",
            post(issue_handler::<R, D, N>),
        )
        .route(
            "/api/v1/training/certificates/:certificate_id/history",
            get(history_handler::<R, D, N>),
        )
        .with_state(routes)
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueRequest {
    pub(crate) issued_by: String,
    /// Issue date override so batches can be replayed in tests.
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CertificateSummaryView {
    pub(crate) id: CertificateId,
    pub(crate) code: String,
    pub(crate) trainee_id: String,
    pub(crate) status: &'static str,
    pub(crate) issued_on: NaiveDate,
    pub(crate) expires_on: NaiveDate,
}

impl CertificateSummaryView {
    fn from_certificate(certificate: &Certificate) -> Self {
        Self {
            id: certificate.id.clone(),
            code: certificate.code.clone(),
            trainee_id: certificate.trainee_id.0.clone(),
            status: certificate.status.label(),
            issued_on: certificate.issued_on,
            expires_on: certificate.expires_on,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchOutcomeView {
    pub(crate) course_id: CourseId,
    pub(crate) issued: Vec<CertificateSummaryView>,
    pub(crate) renewed: Vec<CertificateSummaryView>,
    pub(crate) skipped: Vec<SkippedView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SkippedView {
    pub(crate) trainee_id: String,
    pub(crate) reason: String,
}

impl BatchOutcomeView {
    fn from_outcome(outcome: &CertificateBatchOutcome) -> Self {
        Self {
            course_id: outcome.course_id.clone(),
            issued: outcome
                .issued
                .iter()
                .map(CertificateSummaryView::from_certificate)
                .collect(),
            renewed: outcome
                .renewed
                .iter()
                .map(CertificateSummaryView::from_certificate)
                .collect(),
            skipped: outcome
                .skipped
                .iter()
                .map(|skip| SkippedView {
                    trainee_id: skip.trainee_id.0.clone(),
                    reason: skip.reason.summary(),
                })
                .collect(),
        }
    }
}

pub(crate) async fn issue_handler<R, D, N>(
    State(routes): State<Arc<CertificationRoutes<R, D, N>>>,
    Path(course_id): Path<String>,
    axum::Json(request): axum::Json<IssueRequest>,
) -> Response
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
    let today = request.today.unwrap_or_else(|| Local::now().date_naive());
    let outcome = routes
        .certification
        .issue_for_course(
            &CourseId(course_id),
            &UserId(request.issued_by),
            today,
        )
        .await;

    match outcome {
        Ok(outcome) => (
            StatusCode::OK,
            axum::Json(BatchOutcomeView::from_outcome(&outcome)),
        )
            .into_response(),
        Err(CertificationError::CourseNotFound) => {
            let payload = json!({ "error": "course not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(
            error @ (CertificationError::CourseNotApproved
            | CertificationError::NoSubjectsConfigured
            | CertificationError::Lineage(_)
            | CertificationError::Template(_)),
        ) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn history_handler<R, D, N>(
    State(routes): State<Arc<CertificationRoutes<R, D, N>>>,
    Path(certificate_id): Path<String>,
) -> Response
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
    match routes.history.history(&CertificateId(certificate_id)) {
        Ok(history) => (StatusCode::OK, axum::Json(history)).into_response(),
        Err(HistoryError::CertificateNotFound) => {
            let payload = json!({ "error": "certificate not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
