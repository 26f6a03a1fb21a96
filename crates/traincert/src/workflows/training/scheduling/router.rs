use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{Local, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::super::domain::{ClassSubjectId, ScheduleId, TrainingSchedule, UserId};
use super::super::repository::{
    CourseRepository, PeopleRepository, RepositoryError, ScheduleRepository,
};
use super::rules::ScheduleDraft;
use super::service::{ScheduleService, ScheduleServiceError};

/// Router builder exposing the schedule proposal endpoint.
pub fn schedule_router<R>(service: Arc<ScheduleService<R>>) -> Router
where
    R: ScheduleRepository + CourseRepository + PeopleRepository + 'static,
{
    Router::new()
        .route("/api/v1/training/schedules", post(propose_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleProposalRequest {
    pub(crate) schedule_id: Option<String>,
    pub(crate) class_subject_id: String,
    pub(crate) instructor_id: String,
    pub(crate) teaching_days: BTreeSet<Weekday>,
    pub(crate) class_time: NaiveTime,
    pub(crate) duration_minutes: u32,
    pub(crate) start_day: NaiveDate,
    pub(crate) end_day: NaiveDate,
    pub(crate) location: String,
    pub(crate) room: String,
    /// Evaluation date override so proposals can be replayed in tests.
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScheduleView {
    pub(crate) id: ScheduleId,
    pub(crate) class_subject_id: ClassSubjectId,
    pub(crate) instructor_id: UserId,
    pub(crate) status: &'static str,
    pub(crate) start_day: NaiveDate,
    pub(crate) end_day: NaiveDate,
    pub(crate) location: String,
    pub(crate) room: String,
}

impl ScheduleView {
    fn from_schedule(schedule: TrainingSchedule) -> Self {
        Self {
            id: schedule.id,
            class_subject_id: schedule.class_subject_id,
            instructor_id: schedule.instructor_id,
            status: schedule.status.label(),
            start_day: schedule.start_day,
            end_day: schedule.end_day,
            location: schedule.location,
            room: schedule.room,
        }
    }
}

pub(crate) async fn propose_handler<R>(
    State(service): State<Arc<ScheduleService<R>>>,
    axum::Json(request): axum::Json<ScheduleProposalRequest>,
) -> Response
where
    R: ScheduleRepository + CourseRepository + PeopleRepository + 'static,
{
    let today = request
        .today
        .unwrap_or_else(|| Local::now().date_naive());
    let draft = ScheduleDraft {
        schedule_id: request.schedule_id.map(ScheduleId),
        class_subject_id: ClassSubjectId(request.class_subject_id),
        instructor_id: UserId(request.instructor_id),
        teaching_days: request.teaching_days,
        class_time: request.class_time,
        duration_minutes: request.duration_minutes,
        start_day: request.start_day,
        end_day: request.end_day,
        location: request.location,
        room: request.room,
    };

    match service.propose(draft, today) {
        Ok(schedule) => (
            StatusCode::CREATED,
            axum::Json(ScheduleView::from_schedule(schedule)),
        )
            .into_response(),
        Err(ScheduleServiceError::Rejected(rejection)) => {
            let payload = json!({
                "error": rejection.to_string(),
                "conflicting_schedule_id": rejection.conflicting_schedule().map(|id| id.0.clone()),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(
            error @ (ScheduleServiceError::UnknownClassSubject
            | ScheduleServiceError::UnknownInstructor),
        ) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(ScheduleServiceError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({ "error": "schedule already exists" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
