mod api;
mod convert;
mod errors;
mod report;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::AppState;
use crate::report::{ReportBuilder, ReportConfig};

/// Configuration loaded from environment variables with sensible defaults.
struct Config {
    host: String,
    port: u16,
    template_path: PathBuf,
    logo_path: PathBuf,
}

impl Config {
    fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            template_path: std::env::var("TEMPLATE_PATH")
                .unwrap_or_else(|_| "template.xlsx".into())
                .into(),
            logo_path: std::env::var("LOGO_PATH")
                .unwrap_or_else(|_| "assets/logo.png".into())
                .into(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,taqrir=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    info!("taqrir v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    let reports = ReportBuilder::new(ReportConfig::new(
        config.template_path.clone(),
        config.logo_path.clone(),
    ));

    // Startup probes. A missing template is a warning, not a refusal to
    // start: health keeps reporting the gap and each export fails with
    // the asset error until the file shows up.
    if reports.template_available() {
        info!(template = %config.template_path.display(), "template available");
    } else {
        warn!(template = %config.template_path.display(), "template missing or unreadable");
    }
    let template_dir = config
        .template_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if let Ok(meta) = std::fs::metadata(template_dir) {
        if meta.permissions().readonly() {
            warn!(dir = %template_dir.display(), "template directory is not writable");
        }
    }
    info!(
        logo = %config.logo_path.display(),
        available = reports.default_logo_available(),
        "default logo"
    );
    info!(mode = ?reports.raster(), "logo raster support");
    info!("PDF converter not installed; /api/export-pdf reports the gap");

    let state = AppState {
        reports: Arc::new(reports),
    };

    let app = api::router(state).layer(tower_http::cors::CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!(addr = %addr, "HTTP server listening");
    info!("Excel export:  http://{}/api/export-excel", addr);
    info!("Health check:  http://{}/api/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("taqrir shutdown complete");
}

/// Listen for Ctrl-C or SIGTERM for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c  => info!("Received Ctrl-C"),
        _ = sigterm => info!("Received SIGTERM"),
    }

    info!("Initiating graceful shutdown...");
}
