//! Submission payload validation.
//!
//! The only user-visible errors the service produces: a question file that is
//! missing, empty, oversized or not valid UTF-8. Everything past this point
//! answers 200.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// JSON error body, mirrored by every 4xx response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Validation failures for the submitted question payload
#[derive(Debug, PartialEq, Eq)]
pub enum ApiValidationError {
    /// No body was sent at all
    MissingPayload,
    /// Body decoded to nothing but whitespace
    EmptyQuestion,
    /// Body is not valid UTF-8 text
    NotUtf8,
    /// Body exceeds the configured size cap
    PayloadTooLarge { size: usize, limit: usize },
}

impl ApiValidationError {
    /// The HTTP response this failure maps to
    pub fn to_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let (status, message) = match self {
            ApiValidationError::MissingPayload => (
                StatusCode::BAD_REQUEST,
                "a question file payload is required".to_string(),
            ),
            ApiValidationError::EmptyQuestion => (
                StatusCode::BAD_REQUEST,
                "question file cannot be empty".to_string(),
            ),
            ApiValidationError::NotUtf8 => (
                StatusCode::BAD_REQUEST,
                "question file must be valid UTF-8 text".to_string(),
            ),
            ApiValidationError::PayloadTooLarge { size, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("question file is {} bytes, limit is {}", size, limit),
            ),
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                code: status.as_u16(),
            }),
        )
    }
}

/// Check the raw request body and hand back the decoded question text
pub fn validate_question_payload(
    body: &[u8],
    limit: usize,
) -> Result<String, ApiValidationError> {
    if body.is_empty() {
        return Err(ApiValidationError::MissingPayload);
    }
    if body.len() > limit {
        return Err(ApiValidationError::PayloadTooLarge {
            size: body.len(),
            limit,
        });
    }
    let text = std::str::from_utf8(body).map_err(|_| ApiValidationError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(ApiValidationError::EmptyQuestion);
    }
    Ok(text.to_string())
}
