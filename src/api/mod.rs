pub mod export;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::report::ReportBuilder;

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportBuilder>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/export-excel", post(export::export_excel))
        .route("/api/export-pdf", post(export::export_pdf))
        .route("/api/health", get(health::health_check))
        .with_state(state)
}
