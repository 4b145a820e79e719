// web-server/src/api/mod.rs
pub mod auth;
pub mod session;

use crate::middleware::session::SessionGuard;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig, guard: SessionGuard) {
    cfg.service(auth::health)
        .service(auth::login)
        .service(auth::logout)
        .service(
            actix_web::web::scope("/api")
                .wrap(guard)
                .service(session::current_session)
        );
}
