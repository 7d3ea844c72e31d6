use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_appender::rolling;

use hrms::clock::SystemClock;
use hrms::config::Config;
use hrms::configure_app;
use hrms::db::init_store;
use hrms::routes::RateLimiters;
use hrms::state::AppState;

const EMAIL_WARMUP_BATCH: usize = 500;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let log_level: Level = config
        .log_level
        .parse()
        .with_context(|| format!("LOG_LEVEL has an invalid value '{}'", config.log_level))?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!("Server starting...");

    let store = init_store(&config.database_url).await?;
    let limiters = RateLimiters::from_config(&config)?;
    let server_addr = config.server_addr.clone();
    let state = Data::new(AppState::new(store, config, Arc::new(SystemClock)));

    let warmup_state = state.clone();
    actix_web::rt::spawn(async move {
        match warmup_state.store.all_emails().await {
            Ok(emails) => warmup_state.emails.warm_up(emails, EMAIL_WARMUP_BATCH).await,
            Err(e) => error!(error = %e, "Failed to warm up email index"),
        }
    });

    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .configure(|cfg| configure_app(cfg, state.clone(), &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
