use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_console_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_console::config::{AppConfig, BackendConfig};
use loan_console::error::AppError;
use loan_console::telemetry;
use loan_console::workflows::loan::{HttpLoanGateway, LoanWorkflowService};
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
    if let Some(url) = args.backend_url.take() {
        config.backend.base_url = BackendConfig::normalize_base_url(&url)?;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let gateway = Arc::new(HttpLoanGateway::new(&config.backend)?);
    info!(backend = gateway.base_url(), "loan backend configured");
    let workflow_service = Arc::new(LoanWorkflowService::new(gateway));

    let app = with_console_routes(workflow_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan console ready");

    axum::serve(listener, app).await?;
    Ok(())
}
