use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};

use crate::{
    api::{attendance, dashboard, leave_request, payroll, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

pub fn configure(cfg: &mut web::ServiceConfig, prefix: &str, limiters: &RateLimiters) {
    // Public routes
    cfg.service(
        web::scope(&format!("{prefix}/auth"))
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            // authenticates through the AuthUser extractor
            .service(
                web::resource("/me")
                    .wrap(limiters.protected.clone())
                    .route(web::get().to(handlers::me)),
            ),
    );
    cfg.service(web::resource(format!("{prefix}/leave/types")).route(web::get().to(leave_request::types)));

    // Protected routes
    cfg.service(
        web::scope(prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/users")
                    // /users
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    // /users/profile
                    .service(
                        web::resource("/profile")
                            .route(web::get().to(user::get_profile))
                            .route(web::put().to(user::update_profile)),
                    )
                    // /users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    )
                    // /users/{id}/role
                    .service(web::resource("/{id}/role").route(web::put().to(user::update_role))),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list)))
                    .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/mark").route(web::post().to(attendance::mark)))
                    .service(web::resource("/weekly").route(web::get().to(attendance::weekly)))
                    .service(web::resource("/report").route(web::get().to(attendance::report))),
            )
            .service(
                web::scope("/leave")
                    .service(web::resource("").route(web::get().to(leave_request::list)))
                    .service(web::resource("/apply").route(web::post().to(leave_request::apply)))
                    .service(web::resource("/balance").route(web::get().to(leave_request::balance)))
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get)))
                    .service(
                        web::resource("/{id}/status").route(web::put().to(leave_request::update_status)),
                    )
                    .service(web::resource("/{id}/cancel").route(web::put().to(leave_request::cancel))),
            )
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(
                        web::resource("")
                            .route(web::get().to(payroll::list))
                            .route(web::post().to(payroll::generate)),
                    )
                    .service(web::resource("/summary").route(web::get().to(payroll::summary)))
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get))
                            .route(web::put().to(payroll::update)),
                    )
                    .service(web::resource("/{id}/pay").route(web::put().to(payroll::pay))),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/employee").route(web::get().to(dashboard::employee)))
                    .service(web::resource("/admin").route(web::get().to(dashboard::admin))),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_edge_rates() {
        assert!(build_limiter(60).is_ok());
        // zero is clamped to one request per minute
        assert!(build_limiter(0).is_ok());
        // faster than one per millisecond still yields a valid quota
        assert!(build_limiter(120_000).is_ok());
    }
}
