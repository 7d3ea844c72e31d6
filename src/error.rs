use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use derive_more::Display;
use serde::Serialize;
use utoipa::ToSchema;

use crate::response::ApiResponse;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every failure a handler can return. Rendered as the uniform envelope with
/// `success: false`; internal detail is logged, never sent.
#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", message)]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{}", _0)]
    InvalidState(String),
    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: "Validation failed".to_string(),
            errors: vec![FieldError {
                field: field.to_string(),
                message,
            }],
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation { message, errors } => {
                ApiResponse::<()>::failure(message.clone(), Some(errors.clone()))
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                ApiResponse::<()>::failure("Internal Server Error".to_string(), None)
            }
            other => ApiResponse::<()>::failure(other.to_string(), None),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(key) => AppError::Conflict(format!("{key} already exists")),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: wire_field_name(&field),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid ({})", e.code)),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::Validation {
            message: "Validation failed".to_string(),
            errors,
        }
    }
}

/// `hours_worked` -> `hoursWorked`; struct-level errors are reported on `body`.
fn wire_field_name(field: &str) -> String {
    if field == "__all__" {
        return "body".to_string();
    }
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("Invalid request body: {err}")).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("Invalid query parameters: {err}")).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("Invalid path parameter: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn internal_detail_is_not_exposed() {
        let resp = AppError::Internal("connection refused on 10.0.0.3".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal Server Error");
    }

    #[test]
    fn field_names_use_wire_casing() {
        assert_eq!(wire_field_name("hours_worked"), "hoursWorked");
        assert_eq!(wire_field_name("email"), "email");
        assert_eq!(wire_field_name("__all__"), "body");
    }

    #[test]
    fn duplicate_key_is_conflict() {
        let err: AppError = StoreError::Duplicate("Email".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Email already exists");
    }
}
