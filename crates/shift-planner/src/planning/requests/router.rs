use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{RequestStatusView, VacationRequestGroup, VacationSubmission};
use super::repository::{Notifier, PlanningStore, RepositoryError};
use super::service::{VacationRequestService, VacationServiceError};
use crate::planning::access::{AccessError, TeamFilter};
use crate::planning::domain::{Actor, RequestId, Role, TeamId, UserId};
use crate::planning::export::capacity_csv;
use crate::planning::simulation::Decision;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";
/// Comma-separated role names for the authenticated user.
pub const ROLES_HEADER: &str = "x-user-roles";

/// Router builder exposing the request lifecycle and planning views.
pub fn vacation_router<S, N>(service: Arc<VacationRequestService<S, N>>) -> Router
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/vacations", post(submit_handler::<S, N>))
        .route(
            "/api/v1/vacations/:request_id",
            get(get_handler::<S, N>)
                .put(edit_handler::<S, N>)
                .delete(withdraw_handler::<S, N>),
        )
        .route(
            "/api/v1/vacations/:request_id/approve",
            post(approve_handler::<S, N>),
        )
        .route(
            "/api/v1/vacations/:request_id/reject",
            post(reject_handler::<S, N>),
        )
        .route("/api/v1/planning/overview", get(overview_handler::<S, N>))
        .route("/api/v1/planning/what-if", post(what_if_handler::<S, N>))
        .route(
            "/api/v1/planning/capacity.csv",
            get(capacity_csv_handler::<S, N>),
        )
        .with_state(service)
}

/// Date range plus an optional single-team filter.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

impl RangeQuery {
    fn filter(&self) -> TeamFilter {
        match &self.team_id {
            Some(team_id) => TeamFilter::Team(team_id.clone()),
            None => TeamFilter::All,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectionPayload {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatIfPayload {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    pub decisions: BTreeMap<RequestId, Decision>,
}

#[derive(Debug, Serialize)]
struct GroupView {
    group_id: Option<String>,
    requests: Vec<RequestStatusView>,
}

impl From<&VacationRequestGroup> for GroupView {
    fn from(group: &VacationRequestGroup) -> Self {
        Self {
            group_id: group.group_id.as_ref().map(|id| id.0.clone()),
            requests: group.requests.iter().map(RequestStatusView::from).collect(),
        }
    }
}

/// Reads the actor from the identity headers; unknown role names are ignored.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            let payload = json!({ "error": format!("missing {USER_HEADER} header") });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })?;

    let roles = headers
        .get(ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .split(',')
        .filter_map(Role::parse);

    Ok(Actor {
        user_id: UserId(user_id.to_string()),
        roles: roles.collect(),
    })
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Json(submission): Json<VacationSubmission>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.submit(&actor, submission) {
        Ok(group) => (StatusCode::CREATED, Json(GroupView::from(&group))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.get(&actor, &RequestId(request_id)) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(submission): Json<VacationSubmission>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.edit(&actor, &RequestId(request_id), submission) {
        Ok(group) => (StatusCode::OK, Json(GroupView::from(&group))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn withdraw_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.withdraw(&actor, &RequestId(request_id)) {
        Ok(removed) => (StatusCode::OK, Json(json!({ "withdrawn": removed }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.approve(&actor, &RequestId(request_id)) {
        Ok(request) => {
            (StatusCode::OK, Json(RequestStatusView::from(&request))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reject_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(payload): Json<RejectionPayload>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.reject(&actor, &RequestId(request_id), &payload.reason) {
        Ok(request) => {
            (StatusCode::OK, Json(RequestStatusView::from(&request))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn overview_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Query(range): Query<RangeQuery>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.overview(&actor, &range.filter(), range.from, range.to) {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn what_if_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Json(payload): Json<WhatIfPayload>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let filter = match &payload.team_id {
        Some(team_id) => TeamFilter::Team(team_id.clone()),
        None => TeamFilter::All,
    };
    match service.what_if(&actor, &filter, payload.from, payload.to, &payload.decisions) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn capacity_csv_handler<S, N>(
    State(service): State<Arc<VacationRequestService<S, N>>>,
    headers: HeaderMap,
    Query(range): Query<RangeQuery>,
) -> Response
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let overview = match service.overview(&actor, &range.filter(), range.from, range.to) {
        Ok(overview) => overview,
        Err(err) => return error_response(err),
    };
    match capacity_csv(&overview.capacity) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

/// Maps service failures onto HTTP status codes with a JSON error body.
pub fn error_response(err: VacationServiceError) -> Response {
    let status = match &err {
        VacationServiceError::Access(AccessError::Hierarchy(_))
        | VacationServiceError::Hierarchy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VacationServiceError::Access(_) | VacationServiceError::Forbidden { .. } => {
            StatusCode::FORBIDDEN
        }
        VacationServiceError::Overlap { .. }
        | VacationServiceError::InvalidTransition { .. }
        | VacationServiceError::Persistence(RepositoryError::Conflict) => StatusCode::CONFLICT,
        VacationServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VacationServiceError::NotFound(_)
        | VacationServiceError::Persistence(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        VacationServiceError::Persistence(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let mut payload = json!({ "error": err.to_string() });
    if let VacationServiceError::Overlap {
        date,
        existing: Some(existing),
    } = &err
    {
        payload["date"] = json!(date);
        payload["existing_request_id"] = json!(existing);
    }
    (status, Json(payload)).into_response()
}
