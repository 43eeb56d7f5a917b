//! External document converter boundary.
//!
//! The PDF route hands a filled workbook to an external converter
//! (LibreOffice headless). No converter is wired into this deployment,
//! so the boundary's whole job is to report that cleanly — typed error,
//! no partial output, process keeps running.

use tracing::warn;

use crate::errors::AppError;

/// Convert a serialized workbook to PDF. Always fails with
/// `ConversionUnavailable` before any conversion work; the workbook
/// itself is untouched and discarded by the caller.
pub fn xlsx_to_pdf(_workbook: &[u8]) -> Result<Vec<u8>, AppError> {
    warn!("PDF conversion requested but no converter is installed");
    Err(AppError::ConversionUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_is_a_clean_typed_failure() {
        match xlsx_to_pdf(b"PK\x03\x04") {
            Err(AppError::ConversionUnavailable) => {}
            other => panic!("expected ConversionUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn failure_message_names_the_missing_converter() {
        let err = xlsx_to_pdf(&[]).unwrap_err();
        assert_eq!(err.to_string(), "LibreOffice غير مثبت");
    }
}
