//! Classified API errors shared by the HTTP pipeline, the auth service and
//! the typed API client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy independent of transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    BusinessRuleViolation,
    TimeoutError,
    ServerError,
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => ErrorCode::NetworkError,
            400 => ErrorCode::ValidationError,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            422 => ErrorCode::BusinessRuleViolation,
            408 | 504 => ErrorCode::TimeoutError,
            500..=599 => ErrorCode::ServerError,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        let code = match code.trim().to_ascii_uppercase().as_str() {
            "NETWORK_ERROR" => ErrorCode::NetworkError,
            "VALIDATION_ERROR" | "BAD_REQUEST" => ErrorCode::ValidationError,
            "UNAUTHORIZED" => ErrorCode::Unauthorized,
            "FORBIDDEN" => ErrorCode::Forbidden,
            "NOT_FOUND" => ErrorCode::NotFound,
            "CONFLICT" => ErrorCode::Conflict,
            "BUSINESS_RULE_VIOLATION" => ErrorCode::BusinessRuleViolation,
            "TIMEOUT_ERROR" => ErrorCode::TimeoutError,
            "SERVER_ERROR" | "INTERNAL_SERVER_ERROR" => ErrorCode::ServerError,
            "UNKNOWN" => ErrorCode::Unknown,
            _ => return None,
        };
        Some(code)
    }

    /// Default (English, Thai) message pair shown to the user.
    pub fn messages(self) -> (&'static str, &'static str) {
        match self {
            ErrorCode::NetworkError => (
                "Unable to connect to the server. Please check your connection.",
                "ไม่สามารถเชื่อมต่อกับเซิร์ฟเวอร์ได้ กรุณาตรวจสอบการเชื่อมต่อ",
            ),
            ErrorCode::ValidationError => (
                "The submitted data is invalid.",
                "ข้อมูลที่ส่งไม่ถูกต้อง",
            ),
            ErrorCode::Unauthorized => (
                "Your session has expired. Please log in again.",
                "เซสชันหมดอายุ กรุณาเข้าสู่ระบบอีกครั้ง",
            ),
            ErrorCode::Forbidden => (
                "You do not have permission to perform this action.",
                "คุณไม่มีสิทธิ์ดำเนินการนี้",
            ),
            ErrorCode::NotFound => (
                "The requested resource was not found.",
                "ไม่พบข้อมูลที่ร้องขอ",
            ),
            ErrorCode::Conflict => (
                "The data conflicts with an existing record.",
                "ข้อมูลขัดแย้งกับข้อมูลที่มีอยู่",
            ),
            ErrorCode::BusinessRuleViolation => (
                "The request violates a business rule.",
                "คำขอไม่เป็นไปตามเงื่อนไขที่กำหนด",
            ),
            ErrorCode::TimeoutError => (
                "The request timed out. Please try again.",
                "หมดเวลาการร้องขอ กรุณาลองใหม่อีกครั้ง",
            ),
            ErrorCode::ServerError => (
                "A server error occurred. Please try again later.",
                "เกิดข้อผิดพลาดของเซิร์ฟเวอร์ กรุณาลองใหม่ภายหลัง",
            ),
            ErrorCode::Unknown => (
                "An unexpected error occurred.",
                "เกิดข้อผิดพลาดที่ไม่คาดคิด",
            ),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error produced for every failed API call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub message_th: String,
    /// HTTP status, `0` when the request never reached the server.
    pub status: u16,
    pub method: Option<String>,
    pub path: Option<String>,
    pub details: Option<Value>,
}

/// Error body the portal API returns on failure. Older endpoints send
/// `error` instead of `message`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    message_th: Option<String>,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let (_, message_th) = code.messages();
        Self {
            code,
            message: message.into(),
            message_th: message_th.to_string(),
            status: 0,
            method: None,
            path: None,
            details: None,
        }
    }

    /// Error with the default bilingual message for the status' taxonomy code.
    pub fn from_status(status: u16) -> Self {
        let code = ErrorCode::from_status(status);
        let (message, _) = code.messages();
        Self {
            status,
            ..Self::new(code, message)
        }
    }

    /// Classifies an HTTP error response. A structured body overrides the
    /// default code and message.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let mut error = Self::from_status(status.as_u16());
        let Ok(parsed) = serde_json::from_slice::<ServerErrorBody>(body) else {
            return error;
        };
        if let Some(code) = parsed.code.as_deref().and_then(ErrorCode::parse) {
            let (message, message_th) = code.messages();
            error.code = code;
            error.message = message.to_string();
            error.message_th = message_th.to_string();
        }
        if let Some(message) = parsed.message.or(parsed.error) {
            if !message.trim().is_empty() {
                error.message = message;
            }
        }
        if let Some(message_th) = parsed.message_th {
            error.message_th = message_th;
        }
        error.details = parsed.details;
        error
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self {
            status: 408,
            ..Self::new(ErrorCode::TimeoutError, msg)
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: 401,
            ..Self::new(ErrorCode::Unauthorized, msg)
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, msg)
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, msg)
    }

    pub fn with_request(mut self, method: &str, path: &str) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(path.to_string());
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401 || self.code == ErrorCode::Unauthorized
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NetworkError | ErrorCode::TimeoutError | ErrorCode::ServerError
        )
    }
}

impl From<ApiError> for String {
    fn from(error: ApiError) -> Self {
        error.message
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        messages.sort();
        let mut error = ApiError::validation("Validation failed");
        error.details = Some(serde_json::json!({ "errors": messages }));
        error
    }
}
