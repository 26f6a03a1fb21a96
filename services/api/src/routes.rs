use crate::infra::{AppState, InMemoryTrainingStore};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use traincert::workflows::grades::{GradeCsvImporter, RosterIndex};
use traincert::workflows::training::domain::CourseId;
use traincert::workflows::training::repository::GradeRepository;

#[derive(Debug, Deserialize)]
pub(crate) struct GradeImportRequest {
    /// Course whose roster the sheet is matched against.
    pub(crate) course_id: String,
    /// Raw CSV score sheet content.
    pub(crate) csv: String,
    /// Parse-only mode: report without recording anything.
    #[serde(default)]
    pub(crate) dry_run: bool,
}

pub(crate) fn base_routes(store: Arc<InMemoryTrainingStore>) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/training/grades/import",
            axum::routing::post(grade_import_endpoint),
        )
        .with_state(store)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Import a CSV score sheet against the approved roster. Row problems are
/// itemized in the response; accepted rows are recorded unless `dry_run`.
pub(crate) async fn grade_import_endpoint(
    State(store): State<Arc<InMemoryTrainingStore>>,
    Json(request): Json<GradeImportRequest>,
) -> impl IntoResponse {
    let course = CourseId(request.course_id);
    let (trainees, assigns, class_subjects, subjects) = match store.roster_inputs(&course) {
        Ok(inputs) => inputs,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    };
    let roster = RosterIndex::build(&trainees, &assigns, &class_subjects, &subjects);

    let report =
        match GradeCsvImporter::from_reader(std::io::Cursor::new(request.csv.into_bytes()), &roster)
        {
            Ok(report) => report,
            Err(error) => {
                let payload = json!({ "error": error.to_string() });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        };

    if !request.dry_run {
        for grade in &report.imported {
            if let Err(error) = store.record_grade(grade.clone()) {
                tracing::warn!(%error, "grade row could not be recorded");
            }
        }
    }

    (StatusCode::OK, Json(json!(report))).into_response()
}
