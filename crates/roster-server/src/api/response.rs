//! Response envelopes shared by every JSON endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }

    pub fn paginated(data: T, meta: PaginationMeta) -> Self {
        Self {
            success: true,
            data,
            meta: Some(meta),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub size: u32,
    pub total: i64,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(page: u32, size: u32, total: i64) -> Self {
        let size_i = i64::from(size.max(1));
        Self {
            page,
            size,
            total,
            pages: (total + size_i - 1) / size_i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_pages_round_up() {
        assert_eq!(PaginationMeta::new(1, 100, 250).pages, 3);
        assert_eq!(PaginationMeta::new(1, 100, 0).pages, 0);
        assert_eq!(PaginationMeta::new(1, 100, 100).pages, 1);
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "missing")).unwrap_or_default();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
