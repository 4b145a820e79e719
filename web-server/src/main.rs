// Web Server - main.rs
// Session authentication API: login, cookie sessions, cross-origin gate
mod api;
mod cookies;
mod error;
mod middleware;
mod user_store;


use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Clock, Config, SystemClock};
use middleware::cors;
use middleware::rate_limiter::RateLimiter;
use middleware::session::SessionGuard;
use std::sync::Arc;
use std::time::Duration;
use user_store::{InMemoryUserStore, UserStore};

fn startup_error(err: impl std::fmt::Display) -> std::io::Error {
    tracing::error!("Startup failed: {}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

/// Create the admin account from ADMIN_USERNAME / ADMIN_PASSWORD when both are set.
fn seed_admin(users: &InMemoryUserStore, config: &Config) -> std::io::Result<()> {
    match (config.admin_username.as_deref(), config.admin_password.as_deref()) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            if users.seed_user(username, password).map_err(startup_error)? {
                tracing::info!("Admin user '{}' created", username);
            }
        }
        _ => tracing::info!("ADMIN credentials not set, admin user NOT created"),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration; a missing or invalid secret aborts startup here
    let config = Config::load().map_err(startup_error)?;
    let settings = config.auth_settings().map_err(startup_error)?;

    tracing::info!(
        secure = settings.cookie_policy.secure(),
        same_site = %settings.cookie_policy.same_site(),
        algorithm = ?settings.signer.algorithm(),
        lifetime_hours = settings.signer.lifetime().num_hours(),
        allowed_origins = settings.allowed_origins.len(),
        "Session configuration loaded"
    );

    let users = InMemoryUserStore::new().map_err(startup_error)?;
    seed_admin(&users, &config)?;

    // Save address before moving config into web::Data
    let server_addr = config.web_server_addr.clone();
    let limiter = RateLimiter::new(
        vec!["/login".to_string()],
        config.login_rate_limit,
        Duration::from_secs(config.login_rate_window_seconds),
    );

    let allowed_origins = Arc::new(settings.allowed_origins.clone());
    let settings = web::Data::new(settings);
    let users: web::Data<dyn UserStore> = web::Data::from(Arc::new(users) as Arc<dyn UserStore>);
    let clock: web::Data<dyn Clock> = web::Data::from(Arc::new(SystemClock) as Arc<dyn Clock>);

    tracing::info!("Starting Web Server on {}", server_addr);

    // Start HTTP server
    HttpServer::new(move || {
        let guard = SessionGuard::new(settings.clone(), clock.clone());

        App::new()
            .app_data(settings.clone())
            .app_data(users.clone())
            .app_data(clock.clone())
            .wrap(limiter.clone())
            .wrap(cors::gate(allowed_origins.clone()))
            .wrap(cors::OriginGate::new(allowed_origins.clone()))
            .configure(|cfg| api::configure(cfg, guard))
    })
    .bind(&server_addr)?
    .run()
    .await
}
