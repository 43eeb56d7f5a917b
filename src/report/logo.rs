use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, warn};
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::Image as SheetImage;

use super::workbook::TemplateDocument;

/// Drawing extents are in English Metric Units.
const EMU_PER_PIXEL: i64 = 9525;

/// How raw logo bytes are treated before insertion. Resolved once at
/// compile time; the server logs the active mode at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterSupport {
    /// Decode with the `image` crate, RGBA-normalize, resize to the
    /// requested display size and re-encode as PNG.
    Normalize,
    /// Hand the bytes to the drawing layer untouched.
    Passthrough,
}

pub fn raster_support() -> RasterSupport {
    #[cfg(feature = "raster")]
    {
        RasterSupport::Normalize
    }
    #[cfg(not(feature = "raster"))]
    {
        RasterSupport::Passthrough
    }
}

/// Recovered outcome of the logo step. A skip never fails the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoOutcome {
    Embedded { anchor: String },
    Skipped { reason: String },
}

pub struct LogoRequest<'a> {
    /// Fallback file on disk, used only when no usable inline image came
    /// with the payload.
    pub local_path: Option<&'a Path>,
    /// Inline `data:image/...;base64,...` string. Takes precedence.
    pub data_url: Option<&'a str>,
    pub anchor: &'a str,
    pub width: u32,
    pub height: u32,
}

/// Normalize the logo from whichever source is usable and float it over
/// the sheet, anchored at the top-left of `anchor`. Never fails the
/// build: every fault collapses into `LogoOutcome::Skipped`.
pub fn add_logo(
    doc: &mut TemplateDocument,
    req: &LogoRequest<'_>,
    support: RasterSupport,
) -> LogoOutcome {
    let mut staged: Option<(Vec<u8>, String)> = None;

    if let Some(url) = req.data_url {
        match parse_data_url(url) {
            Some((subtype, raw)) => {
                debug!(bytes = raw.len(), subtype = %subtype, "logo from inline data URL");
                staged = Some(prepare(raw, subtype, support, req.width, req.height));
            }
            None => warn!("inline logo is not a well-formed image data URL; ignoring"),
        }
    }

    if staged.is_none() {
        if let Some(path) = req.local_path.filter(|p| p.exists()) {
            match std::fs::read(path) {
                Ok(raw) => {
                    let ext = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("png")
                        .to_ascii_lowercase();
                    debug!(path = %path.display(), "logo from local file");
                    staged = Some(prepare(raw, ext, support, req.width, req.height));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot read logo file"),
            }
        }
    }

    let Some((bytes, ext)) = staged else {
        return LogoOutcome::Skipped {
            reason: "no usable logo source".into(),
        };
    };

    match insert(doc, &bytes, &ext, req) {
        Ok(()) => LogoOutcome::Embedded {
            anchor: req.anchor.to_string(),
        },
        Err(e) => {
            warn!(error = %e, "logo insertion failed");
            LogoOutcome::Skipped {
                reason: e.to_string(),
            }
        }
    }
}

/// `data:image/<subtype>;base64,<payload>` → (subtype, decoded bytes).
/// Anything that does not match that exact shape is rejected.
pub(crate) fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:image/")?;
    let (subtype, payload) = rest.split_once(";base64,")?;
    if subtype.is_empty() || subtype.contains(';') || payload.is_empty() {
        return None;
    }
    let bytes = BASE64.decode(payload).ok()?;
    Some((subtype.to_ascii_lowercase(), bytes))
}

fn prepare(
    raw: Vec<u8>,
    ext: String,
    support: RasterSupport,
    width: u32,
    height: u32,
) -> (Vec<u8>, String) {
    match support {
        RasterSupport::Normalize => match normalize(&raw, width, height) {
            Ok(png) => (png, "png".to_string()),
            Err(e) => {
                warn!(error = %e, "raster normalization failed, embedding bytes as-is");
                (raw, ext)
            }
        },
        RasterSupport::Passthrough => (raw, ext),
    }
}

/// Decode → RGBA8 → exact resize (caller dimensions win, aspect ratio is
/// not preserved) → lossless PNG.
#[cfg(feature = "raster")]
fn normalize(raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    use image::{imageops::FilterType, DynamicImage, ImageOutputFormat};
    use std::io::Cursor;

    let decoded = image::load_from_memory(raw).context("decode logo bytes")?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);
    let rgba = DynamicImage::ImageRgba8(resized.to_rgba8());
    let mut out = Cursor::new(Vec::new());
    rgba.write_to(&mut out, ImageOutputFormat::Png)
        .context("re-encode logo as PNG")?;
    Ok(out.into_inner())
}

#[cfg(not(feature = "raster"))]
fn normalize(_raw: &[u8], _width: u32, _height: u32) -> Result<Vec<u8>> {
    Err(anyhow!("raster support compiled out"))
}

/// The drawing layer chokes on byte soup; only hand it containers it
/// understands.
fn looks_like_raster(bytes: &[u8]) -> bool {
    bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || bytes.starts_with(b"BM")
}

fn insert(
    doc: &mut TemplateDocument,
    bytes: &[u8],
    ext: &str,
    req: &LogoRequest<'_>,
) -> Result<()> {
    if !looks_like_raster(bytes) {
        return Err(anyhow!("bytes are not a recognized raster image"));
    }

    // The drawing layer ingests images from a path; stage the bytes.
    let staged = tempfile::Builder::new()
        .prefix("logo-")
        .suffix(&format!(".{ext}"))
        .tempfile()
        .context("create staging file for logo")?;
    std::fs::write(staged.path(), bytes).context("write staged logo bytes")?;
    let staged_path = staged
        .path()
        .to_str()
        .ok_or_else(|| anyhow!("staging path is not valid UTF-8"))?;

    let mut marker = MarkerType::default();
    marker.set_coordinate(req.anchor);
    let mut drawing = SheetImage::default();
    drawing.new_image(staged_path, marker);

    // Force the display extent regardless of the source dimensions.
    if let Some(anchor) = drawing.get_one_cell_anchor_mut() {
        let extent = anchor.get_extent_mut();
        extent.set_cx(req.width as i64 * EMU_PER_PIXEL);
        extent.set_cy(req.height as i64 * EMU_PER_PIXEL);
    }

    let sheet = doc
        .sheet_mut()
        .ok_or_else(|| anyhow!("workbook has no sheets"))?;
    sheet.add_image(drawing);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blank_document() -> TemplateDocument {
        let book = umya_spreadsheet::new_file();
        let mut cursor = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor).unwrap();
        TemplateDocument::from_bytes(&cursor.into_inner()).unwrap()
    }

    #[cfg(feature = "raster")]
    fn tiny_png() -> Vec<u8> {
        use image::{DynamicImage, ImageOutputFormat, RgbaImage};
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            image::Rgba([10, 20, 30, 255]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn rejects_malformed_data_urls() {
        for url in [
            "",
            "logo.png",
            "data:image/png",
            "data:image/png;base64,",
            "data:image/;base64,QUJD",
            "data:text/plain;base64,QUJD",
            "data:image/png;base64,@@not-base64@@",
        ] {
            assert!(parse_data_url(url).is_none(), "accepted: {url}");
        }
    }

    #[test]
    fn decodes_well_formed_data_url() {
        // "ABC" in base64.
        let (subtype, bytes) = parse_data_url("data:image/png;base64,QUJD").unwrap();
        assert_eq!(subtype, "png");
        assert_eq!(bytes, b"ABC");
    }

    #[test]
    fn no_source_is_a_recovered_skip() {
        let mut doc = blank_document();
        let outcome = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: None,
                data_url: None,
                anchor: "E1",
                width: 100,
                height: 80,
            },
            raster_support(),
        );
        assert!(matches!(outcome, LogoOutcome::Skipped { .. }));
        // The document still serializes untouched.
        assert!(doc.to_bytes().is_ok());
    }

    #[test]
    fn malformed_data_url_without_fallback_skips() {
        let mut doc = blank_document();
        let outcome = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: Some(Path::new("/definitely/not/here.png")),
                data_url: Some("data:image/png"),
                anchor: "E1",
                width: 100,
                height: 80,
            },
            raster_support(),
        );
        assert!(matches!(outcome, LogoOutcome::Skipped { .. }));
        assert!(doc.to_bytes().is_ok());
    }

    #[cfg(feature = "raster")]
    #[test]
    fn inline_data_url_embeds() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(tiny_png()));
        let mut doc = blank_document();
        let outcome = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: None,
                data_url: Some(&url),
                anchor: "E1",
                width: 100,
                height: 80,
            },
            RasterSupport::Normalize,
        );
        assert_eq!(
            outcome,
            LogoOutcome::Embedded {
                anchor: "E1".into()
            }
        );
        assert!(doc.to_bytes().is_ok());
    }

    #[cfg(feature = "raster")]
    #[test]
    fn local_file_is_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        std::fs::write(&logo_path, tiny_png()).unwrap();

        let mut doc = blank_document();
        let outcome = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: Some(&logo_path),
                data_url: None,
                anchor: "E5",
                width: 120,
                height: 120,
            },
            RasterSupport::Normalize,
        );
        assert_eq!(
            outcome,
            LogoOutcome::Embedded {
                anchor: "E5".into()
            }
        );
    }

    #[cfg(feature = "raster")]
    #[test]
    fn inline_wins_over_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        std::fs::write(&logo_path, tiny_png()).unwrap();

        let url = format!("data:image/png;base64,{}", BASE64.encode(tiny_png()));
        let mut doc = blank_document();
        let outcome = add_logo(
            &mut doc,
            &LogoRequest {
                local_path: Some(&logo_path),
                data_url: Some(&url),
                anchor: "E1",
                width: 100,
                height: 80,
            },
            RasterSupport::Normalize,
        );
        assert!(matches!(outcome, LogoOutcome::Embedded { .. }));
    }

    #[cfg(feature = "raster")]
    #[test]
    fn undecodable_bytes_fall_back_to_raw() {
        let (bytes, ext) = prepare(
            b"not an image".to_vec(),
            "png".into(),
            RasterSupport::Normalize,
            100,
            80,
        );
        assert_eq!(bytes, b"not an image");
        assert_eq!(ext, "png");
    }
}
