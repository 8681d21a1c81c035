use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use shift_planner::planning::requests::{
    vacation_router, Notifier, PlanningStore, VacationRequestService,
};
use std::sync::Arc;

pub(crate) fn with_planning_routes<S, N>(service: Arc<VacationRequestService<S, N>>) -> axum::Router
where
    S: PlanningStore + 'static,
    N: Notifier + 'static,
{
    vacation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_snapshot;
    use crate::infra::{InMemoryPlanningStore, LoggingNotifier};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use shift_planner::planning::PlanningSettings;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> (axum::Router, LoggingNotifier) {
        let store = Arc::new(InMemoryPlanningStore::from_snapshot(demo_snapshot(
            NaiveDate::from_ymd_opt(2025, 6, 9).expect("valid date"),
        )));
        let notifier = LoggingNotifier::default();
        let service = Arc::new(VacationRequestService::new(
            store,
            Arc::new(notifier.clone()),
            PlanningSettings::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        (with_planning_routes(service).layer(Extension(state)), notifier)
    }

    async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_the_startup_flag() {
        let (app, _) = app(false);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_json_body(response).await["status"], "initializing");
    }

    #[tokio::test]
    async fn submissions_flow_through_the_in_memory_store() {
        let (app, notifier) = app(true);
        let submit = Request::builder()
            .method("POST")
            .uri("/api/v1/vacations")
            .header("x-user-id", "lena")
            .header("x-user-roles", "team_member")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "team_id": "payments", "start_date": "2025-06-12" }).to_string(),
            ))
            .expect("request builds");

        let response = app.clone().oneshot(submit).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(notifier.events().len(), 1);

        let overview = Request::builder()
            .uri("/api/v1/planning/overview?from=2025-06-12&to=2025-06-12&team_id=payments")
            .header("x-user-id", "nora")
            .header("x-user-roles", "manager")
            .body(Body::empty())
            .expect("request builds");
        let response = app.oneshot(overview).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json_body(response).await;
        let pending = body["pending_requests"].as_array().expect("pending list");
        assert!(pending.iter().any(|request| request["user_id"] == "lena"));
    }
}
