pub mod logo;
pub mod workbook;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;

use chrono::Local;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AppError;
use self::logo::{add_logo, raster_support, LogoOutcome, LogoRequest, RasterSupport};
use self::workbook::{FieldOutcome, TemplateDocument};

/// Fixed field vocabulary → template coordinates, in canonical order.
/// The template layout is an external asset; these addresses are part of
/// its contract.
const CELL_MAP: &[(&str, &str)] = &[
    ("request_id", "C8"),
    ("maintenance_type", "F8"),
    ("location", "I8"),
    ("priority", "D9"),
    ("requester_name", "D11"),
    ("request_time", "D13"),
    ("request_date", "H13"),
    ("fault_type", "C15"),
    ("fault_desc", "A19"),
    ("technician_name", "C25"),
    ("execution_date", "H26"),
    ("supervisor_name", "C29"),
    ("status", "C30"),
    ("status_date", "H31"),
    ("requester_name_2", "C34"),
    ("is_fixed", "C35"),
    ("fixed_date", "H36"),
];

const FILENAME_PREFIX: &str = "تقرير_صيانة";

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FieldBinding {
    pub field: String,
    pub cell: String,
}

/// Everything the builder needs, passed in explicitly so tests can run
/// against alternate templates and mappings.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub template_path: PathBuf,
    pub default_logo: PathBuf,
    pub cell_map: Vec<FieldBinding>,
    /// Excel export floats the logo at this cell's top-left.
    pub logo_anchor: String,
    pub logo_width: u32,
    pub logo_height: u32,
}

impl ReportConfig {
    pub fn new(template_path: PathBuf, default_logo: PathBuf) -> Self {
        Self {
            template_path,
            default_logo,
            ..Self::default()
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("template.xlsx"),
            default_logo: PathBuf::from("assets/logo.png"),
            cell_map: CELL_MAP
                .iter()
                .map(|(field, cell)| FieldBinding {
                    field: (*field).to_string(),
                    cell: (*cell).to_string(),
                })
                .collect(),
            logo_anchor: "E1".to_string(),
            logo_width: 100,
            logo_height: 80,
        }
    }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Incoming export payload. Beyond `request_id` and the inline logo the
/// body is an open map: recognized field names are written, everything
/// else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportPayload {
    #[serde(default)]
    pub request_id: Option<Value>,
    #[serde(default)]
    pub logo_data_url: Option<Value>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ReportPayload {
    /// `request_id` rendered to text, if present and non-empty.
    pub fn request_id_text(&self) -> Option<String> {
        scalar_text(self.request_id.as_ref()?)
    }

    /// Inline logo string, if the payload carries a non-empty one. Shape
    /// validation happens later in the embedder.
    fn inline_logo(&self) -> Option<&str> {
        self.logo_data_url
            .as_ref()?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    fn field_text(&self, field: &str) -> Option<String> {
        if field == "request_id" {
            return self.request_id_text();
        }
        scalar_text(self.fields.get(field)?)
    }
}

/// JSON scalar → cell text. Null, empty strings and non-scalars count as
/// absent: the template default stays untouched.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Typed record of what a build actually did. Recovered failures live
/// here for diagnostics; they never change the HTTP contract.
#[derive(Debug)]
pub struct BuildOutcome {
    pub fields: Vec<FieldOutcome>,
    pub logo: LogoOutcome,
}

impl BuildOutcome {
    pub fn written(&self) -> usize {
        self.fields
            .iter()
            .filter(|o| matches!(o, FieldOutcome::Written { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.fields.len() - self.written()
    }
}

#[derive(Debug)]
pub struct ReportArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub outcome: BuildOutcome,
}

pub struct ReportBuilder {
    config: ReportConfig,
    raster: RasterSupport,
}

impl ReportBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            raster: raster_support(),
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn raster(&self) -> RasterSupport {
        self.raster
    }

    /// Template exists and opens for reading.
    pub fn template_available(&self) -> bool {
        File::open(&self.config.template_path).is_ok()
    }

    pub fn default_logo_available(&self) -> bool {
        self.config.default_logo.exists()
    }

    /// Excel export: load, logo, vocabulary walk, serialize.
    pub fn build_excel(&self, payload: &ReportPayload) -> Result<ReportArtifact, AppError> {
        let request_id = payload
            .request_id_text()
            .ok_or(AppError::MissingRequestId)?;
        let mut doc = self.load_template()?;

        let logo = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: Some(self.config.default_logo.as_path()),
                data_url: payload.inline_logo(),
                anchor: &self.config.logo_anchor,
                width: self.config.logo_width,
                height: self.config.logo_height,
            },
            self.raster,
        );
        if let LogoOutcome::Skipped { reason } = &logo {
            debug!(reason = %reason, "report proceeds without a logo");
        }

        let fields = self.fill(&mut doc, payload);
        let bytes = doc.to_bytes()?;
        let filename = excel_filename(&request_id);

        Ok(ReportArtifact {
            bytes,
            filename,
            outcome: BuildOutcome { fields, logo },
        })
    }

    /// PDF export fills the same template — without the logo step — and
    /// then goes through the converter boundary, which has no working
    /// backend and reports that. The filled workbook is discarded.
    pub fn build_pdf(&self, payload: &ReportPayload) -> Result<ReportArtifact, AppError> {
        let request_id = payload
            .request_id_text()
            .ok_or(AppError::MissingRequestId)?;
        let mut doc = self.load_template()?;

        let fields = self.fill(&mut doc, payload);
        let workbook = doc.to_bytes()?;
        let filename = pdf_filename(&request_id);
        let bytes = crate::convert::xlsx_to_pdf(&workbook)?;

        Ok(ReportArtifact {
            bytes,
            filename,
            outcome: BuildOutcome {
                fields,
                logo: LogoOutcome::Skipped {
                    reason: "pdf export does not embed a logo".into(),
                },
            },
        })
    }

    fn load_template(&self) -> Result<TemplateDocument, AppError> {
        if !self.template_available() {
            return Err(AppError::TemplateUnavailable);
        }
        TemplateDocument::load(&self.config.template_path)
    }

    fn fill(&self, doc: &mut TemplateDocument, payload: &ReportPayload) -> Vec<FieldOutcome> {
        let mut outcomes = Vec::with_capacity(self.config.cell_map.len());
        for binding in &self.config.cell_map {
            let Some(value) = payload.field_text(&binding.field) else {
                continue;
            };
            let outcome = doc.set_cell(&binding.field, &binding.cell, &value);
            if let FieldOutcome::Skipped { field, reason } = &outcome {
                warn!(field = %field, reason = %reason, "field write skipped");
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

// ─── Filenames ───────────────────────────────────────────────────────────────

fn excel_filename(request_id: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!(
        "{FILENAME_PREFIX}_{}_{stamp}.xlsx",
        sanitize_request_id(request_id)
    )
}

fn pdf_filename(request_id: &str) -> String {
    format!("{FILENAME_PREFIX}_{}.pdf", sanitize_request_id(request_id))
}

/// Replace every maximal run of characters outside
/// `[A-Za-z0-9_\u{0600}-\u{06FF}-]` with a single underscore.
pub fn sanitize_request_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for ch in raw.chars() {
        if is_filename_safe(ch) {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

fn is_filename_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ('\u{0600}'..='\u{06FF}').contains(&ch)
}
