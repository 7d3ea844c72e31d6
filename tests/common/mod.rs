#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use actix_http::Request;
use actix_web::body::{MessageBody, to_bytes};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::test::TestRequest;
use actix_web::web::Data;
use actix_web::{App, ResponseError, test};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};

use hrms::clock::ManualClock;
use hrms::config::Config;
use hrms::configure_app;
use hrms::routes::RateLimiters;
use hrms::state::AppState;
use hrms::store::memory::MemoryStore;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub struct TestContext {
    pub state: Data<AppState>,
    pub limiters: RateLimiters,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    pub fn new(start: NaiveDateTime) -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("memory://".into()),
            "JWT_SECRET" => Some("integration-secret".into()),
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            _ => None,
        })
        .unwrap();
        let limiters = RateLimiters::from_config(&config).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let state = Data::new(AppState::new(Arc::new(MemoryStore::new()), config, clock.clone()));
        Self { state, limiters, clock }
    }
}

pub async fn init(
    ctx: &TestContext,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(App::new().configure(|cfg| configure_app(cfg, ctx.state.clone(), &ctx.limiters))).await
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).peer_addr(peer())
}

pub fn post(path: &str, body: Value) -> TestRequest {
    TestRequest::post().uri(path).peer_addr(peer()).set_json(body)
}

pub fn put(path: &str, body: Value) -> TestRequest {
    TestRequest::put().uri(path).peer_addr(peer()).set_json(body)
}

pub fn delete(path: &str) -> TestRequest {
    TestRequest::delete().uri(path).peer_addr(peer())
}

pub fn authed(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((AUTHORIZATION, format!("Bearer {token}")))
}

/// Status and parsed JSON body. Errors raised by middleware are rendered
/// the way the server would render them.
pub async fn send<S, B>(app: &S, req: TestRequest) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, bytes) = match app.call(req.to_request()).await {
        Ok(resp) => (resp.status(), test::read_body(resp).await),
        Err(err) => {
            let resp = err.as_response_error().error_response();
            let status = resp.status();
            let Ok(bytes) = to_bytes(resp.into_body()).await else {
                panic!("unreadable error body");
            };
            (status, bytes)
        }
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

/// Registers an account and returns `(token, user id)`.
pub async fn register<S, B>(app: &S, name: &str, email: &str, employee_id: &str) -> (String, u64)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let body = json!({
        "name": name,
        "email": email,
        "password": "Secret123",
        "employeeId": employee_id,
        "department": "Engineering"
    });
    let (status, json) = send(app, post("/api/auth/register", body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    (
        json["data"]["token"].as_str().unwrap().to_string(),
        json["data"]["user"]["id"].as_u64().unwrap(),
    )
}
