pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod utils;

use actix_web::{HttpRequest, HttpResponse, web};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::error::{AppError, json_error_handler, path_error_handler, query_error_handler};
use crate::routes::RateLimiters;
use crate::state::AppState;

async fn health() -> HttpResponse {
    response::message("ok")
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!("Route {} not found", req.path())))
}

/// Everything mounted on the `App`: shared state, extractor error
/// handling, the route table, docs and the fallback.
pub fn configure_app(cfg: &mut web::ServiceConfig, state: web::Data<AppState>, limiters: &RateLimiters) {
    let prefix = state.config.api_prefix.clone();

    cfg.app_data(state)
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .route("/health", web::get().to(health))
        .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .configure(|cfg| routes::configure(cfg, &prefix, limiters))
        .default_service(web::to(not_found));
}
