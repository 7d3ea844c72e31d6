use actix_web::HttpResponse;
use serde::Serialize;

use crate::error::FieldError;
use crate::store::{Page, Paged};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: Page, total: u64) -> Self {
        let limit = u64::from(page.limit);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            pages: total.div_ceil(limit),
        }
    }
}

/// `{ success, message?, data?, errors? }`, plus `page/limit/total/pages`
/// for list endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(flatten)]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            errors: None,
            pagination: None,
        }
    }

    pub fn failure(message: String, errors: Option<Vec<FieldError>>) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
            errors,
            pagination: None,
        }
    }
}

pub fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(message, data))
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse::success(message, data))
}

pub fn message(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::<()> {
        success: true,
        message: Some(message.to_string()),
        data: None,
        errors: None,
        pagination: None,
    })
}

pub fn paginated<T: Serialize>(message: &str, page: Page, paged: Paged<T>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        message: Some(message.to_string()),
        data: Some(paged.items),
        errors: None,
        pagination: Some(Pagination::new(page, paged.total)),
    })
}
