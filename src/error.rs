use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

pub const ERROR_TYPE: &str = "invalid_request_error";
/// Reported for every rejection, whichever check failed.
pub const ERROR_CODE: &str = "invalid_api_key";

/// Why a request was refused at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    MalformedHeader,
    UnknownKey,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingHeader => "Missing Authorization header",
            AuthFailure::MalformedHeader => {
                "Invalid Authorization header format. Use: Bearer <token>"
            }
            AuthFailure::UnknownKey => "Invalid API key",
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl ResponseError for AuthFailure {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.message()))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    pub error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail<'a> {
    pub message: &'a str,
    #[serde(rename = "type")]
    pub error_type: &'a str,
    pub code: &'a str,
}

impl<'a> ErrorResponse<'a> {
    pub fn new(message: &'a str) -> Self {
        Self {
            error: ErrorDetail {
                message,
                error_type: ERROR_TYPE,
                code: ERROR_CODE,
            },
        }
    }
}
