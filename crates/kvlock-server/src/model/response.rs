//! HTTP response types for the kvlock server

use actix_web::{HttpResponse, HttpResponseBuilder, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Non-standard status used when the caller went away before the lock was granted.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub const MESSAGE_LOCK_BUSY: &str = "Service temporarily unavailable. Please try again later.";
pub const MESSAGE_CLIENT_CLOSED: &str = "Client closed request";
pub const MESSAGE_STORE_UNAVAILABLE: &str =
    "Service temporarily unavailable due to connection issues";
pub const MESSAGE_UNEXPECTED: &str = "An unexpected error occurred";

/// Body of a successful counter increment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResult {
    pub count: i64,
}

impl CountResult {
    pub fn http_success(count: i64) -> HttpResponse {
        HttpResponse::Ok().json(CountResult { count })
    }
}

/// Error result for API error responses
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
}

impl ErrorResult {
    pub fn new(message: &str) -> Self {
        ErrorResult {
            error: message.to_string(),
        }
    }

    pub fn http_response(status: u16, message: &str) -> HttpResponse {
        HttpResponseBuilder::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        )
        .json(ErrorResult::new(message))
    }

    pub fn lock_busy() -> HttpResponse {
        Self::http_response(StatusCode::SERVICE_UNAVAILABLE.as_u16(), MESSAGE_LOCK_BUSY)
    }

    pub fn client_closed() -> HttpResponse {
        Self::http_response(CLIENT_CLOSED_REQUEST, MESSAGE_CLIENT_CLOSED)
    }

    pub fn store_unavailable() -> HttpResponse {
        Self::http_response(
            StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            MESSAGE_STORE_UNAVAILABLE,
        )
    }

    pub fn unexpected() -> HttpResponse {
        Self::http_response(
            StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            MESSAGE_UNEXPECTED,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_result_serializes_single_field() {
        let json = serde_json::to_value(ErrorResult::new(MESSAGE_CLIENT_CLOSED)).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Client closed request" }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorResult::lock_busy().status().as_u16(), 503);
        assert_eq!(ErrorResult::client_closed().status().as_u16(), 499);
        assert_eq!(ErrorResult::store_unavailable().status().as_u16(), 503);
        assert_eq!(ErrorResult::unexpected().status().as_u16(), 500);
        assert_eq!(CountResult::http_success(3).status(), StatusCode::OK);
    }
}
