// web-server/src/api/session.rs
use actix_web::{get, HttpResponse, Responder};

use crate::middleware::session::Authenticated;

// Who the session cookie belongs to and when it runs out
#[get("/session")]
pub async fn current_session(auth: Authenticated) -> impl Responder {
    HttpResponse::Ok().json(auth.principal())
}
