use thiserror::Error;

/// Request-level error taxonomy. Per-field and logo faults are NOT here:
/// those are recovered inside the report builder and only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("request_id مطلوب")]
    MissingRequestId,

    #[error("ملف القالب غير متاح أو لا توجد صلاحيات كافية")]
    TemplateUnavailable,

    #[error("فشل في تحميل القالب: {0}")]
    TemplateLoad(String),

    #[error("خطأ في إنشاء التقرير: {0}")]
    Render(String),

    #[error("LibreOffice غير مثبت")]
    ConversionUnavailable,
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;

        let status = match &self {
            AppError::MissingRequestId => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Every failure leaves the client with the same JSON shape.
        let body = serde_json::json!({
            "ok": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn missing_request_id_maps_to_400() {
        let resp = AppError::MissingRequestId.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn everything_else_maps_to_500() {
        for err in [
            AppError::TemplateUnavailable,
            AppError::TemplateLoad("corrupt".into()),
            AppError::Render("save failed".into()),
            AppError::ConversionUnavailable,
        ] {
            let resp = err.into_response();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
