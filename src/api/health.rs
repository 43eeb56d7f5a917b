use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub template_available: bool,
    pub template_path: String,
    pub logo_available: bool,
}

/// Always 200; asset problems show up in the flags, not the status.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reports = &state.reports;
    Json(HealthResponse {
        status: "ok".to_string(),
        template_available: reports.template_available(),
        template_path: reports.config().template_path.display().to_string(),
        logo_available: reports.default_logo_available(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportBuilder, ReportConfig};
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn reports_missing_assets_with_ok_status() {
        let state = AppState {
            reports: Arc::new(ReportBuilder::new(ReportConfig::new(
                PathBuf::from("/no/such/template.xlsx"),
                PathBuf::from("/no/such/logo.png"),
            ))),
        };
        let Json(body) = health_check(State(state)).await;
        assert_eq!(body.status, "ok");
        assert!(!body.template_available);
        assert!(!body.logo_available);
        assert_eq!(body.template_path, "/no/such/template.xlsx");
    }

    #[tokio::test]
    async fn reports_present_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        let book = umya_spreadsheet::new_file();
        umya_spreadsheet::writer::xlsx::write(&book, &template).unwrap();

        let state = AppState {
            reports: Arc::new(ReportBuilder::new(ReportConfig::new(
                template,
                dir.path().join("logo.png"),
            ))),
        };
        let Json(body) = health_check(State(state)).await;
        assert!(body.template_available);
        assert!(!body.logo_available);
    }
}
