use crate::cli::ServeArgs;
use crate::infra::{AppState, MatchingEngine};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cleanmatch::clock::SystemClock;
use cleanmatch::config::AppConfig;
use cleanmatch::error::AppError;
use cleanmatch::telemetry;
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

    let engine = MatchingEngine::in_memory(&config.matching, Arc::new(SystemClock));
    if let Some(path) = config.directory.roster_csv.as_deref() {
        engine.seed_roster(path)?;
    }
    let sweeper = engine.sweeper.clone().spawn(config.matching.sweep_interval);

    let app = with_matching_routes(&engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        invitation_ttl_minutes = config.matching.invitation_ttl.num_minutes(),
        sweep_interval_secs = config.matching.sweep_interval.as_secs(),
        "cleaning marketplace ready"
    );

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;
    Ok(())
}
