use crate::exposition;
use alicloud_collector::Orchestrator;
use alicloud_exporter_config::Config;
use axum::{
    extract::State,
    http::header,
    response::{
        Html,
        IntoResponse,
        Response,
    },
    routing::get,
    Json,
    Router,
};
use eyre::{
    Result,
    WrapErr,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.config.server.metrics_path.clone();
    let mut router = Router::new().route(&metrics_path, get(metrics));
    if metrics_path != HEALTH_PATH {
        router = router.route(HEALTH_PATH, get(health));
    }
    if metrics_path != "/" {
        router = router.route("/", get(index));
    }
    router.with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let scrape = state.orchestrator.scrape().await;
    let body = exposition::render(&scrape.samples);
    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response()
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.orchestrator.stats();
    let collectors = state
        .orchestrator
        .collectors()
        .iter()
        .map(|collector| collector.name().to_string())
        .collect::<Vec<_>>();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "collectors": collectors,
        "scrapes_total": stats.scrapes_total,
        "scrape_errors_total": stats.errors_total,
    }))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let metrics_path = &state.config.server.metrics_path;
    Html(format!(
        "<html>\n\
         <head><title>Alibaba Cloud Exporter</title></head>\n\
         <body>\n\
         <h1>Alibaba Cloud Exporter</h1>\n\
         <p>Version {}</p>\n\
         <p><a href=\"{metrics_path}\">Metrics</a></p>\n\
         <p><a href=\"{HEALTH_PATH}\">Health</a></p>\n\
         </body>\n\
         </html>\n",
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Serves until SIGINT or SIGTERM, then stops the orchestrator.
pub async fn start_server(config: Config) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(&config).wrap_err("Failed to create the Alibaba Cloud client")?);
    let address = config.server.listen_address.clone();
    let metrics_path = config.server.metrics_path.clone();
    let app = create_router(AppState {
        config: Arc::new(config),
        orchestrator: orchestrator.clone(),
    });

    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to listen on {address}"))?;
    info!(%address, %metrics_path, "Exporter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("HTTP server failed")?;

    orchestrator.close();
    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
