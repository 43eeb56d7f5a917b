use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, instrument};

use crate::api::AppState;
use crate::errors::AppError;
use crate::report::{ReportArtifact, ReportPayload};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PDF_MIME: &str = "application/pdf";

#[instrument(skip(state, payload))]
pub async fn export_excel(
    State(state): State<AppState>,
    Json(payload): Json<ReportPayload>,
) -> Result<Response, AppError> {
    let artifact = state.reports.build_excel(&payload)?;
    info!(
        filename = %artifact.filename,
        fields_written = artifact.outcome.written(),
        fields_skipped = artifact.outcome.skipped(),
        logo = ?artifact.outcome.logo,
        "excel report generated"
    );
    Ok(attachment(artifact, XLSX_MIME))
}

#[instrument(skip(state, payload))]
pub async fn export_pdf(
    State(state): State<AppState>,
    Json(payload): Json<ReportPayload>,
) -> Result<Response, AppError> {
    // Today this always errors at the converter boundary; the arm below
    // is the contract for a deployment that does wire a converter in.
    let artifact = state.reports.build_pdf(&payload)?;
    info!(filename = %artifact.filename, "pdf report generated");
    Ok(attachment(artifact, PDF_MIME))
}

fn attachment(artifact: ReportArtifact, mime: &str) -> Response {
    // RFC 5987 form: the generated filenames are Arabic, a bare
    // `filename=` would be mangled by clients.
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        percent_encode(&artifact.filename)
    );
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// Percent-encode everything outside the RFC 5987 attr-char set, over
/// the UTF-8 byte representation.
fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(*byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
