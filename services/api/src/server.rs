use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryPlanningStore, LoggingNotifier};
use crate::routes::with_planning_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shift_planner::config::AppConfig;
use shift_planner::error::AppError;
use shift_planner::planning::requests::VacationRequestService;
use shift_planner::planning::PlanningSnapshot;
use shift_planner::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let snapshot = match args.snapshot.take() {
        Some(path) => {
            let snapshot = PlanningSnapshot::from_path(&path)?;
            info!(
                path = %path.display(),
                teams = snapshot.teams.len(),
                requests = snapshot.requests.len(),
                "planning snapshot loaded"
            );
            snapshot
        }
        None => PlanningSnapshot::default(),
    };
    let store = Arc::new(InMemoryPlanningStore::from_snapshot(snapshot));
    let notifier = Arc::new(LoggingNotifier::default());
    let service = Arc::new(VacationRequestService::new(
        store,
        notifier,
        config.planning.settings(),
    ));

    let app = with_planning_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "shift planner ready");

    axum::serve(listener, app).await?;
    Ok(())
}
