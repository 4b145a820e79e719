// web-server/src/api/auth.rs
use actix_web::{get, post, web, HttpResponse, Responder};
use common::{AuthError, AuthSettings, Clock};
use serde::Deserialize;
use serde_json::json;

use crate::cookies;
use crate::error::ApiError;
use crate::user_store::UserStore;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Check the password and, on success, set the session cookie.
///
/// The body never carries the credential. Unknown users and wrong passwords
/// get the same response.
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    settings: web::Data<AuthSettings>,
    users: web::Data<dyn UserStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { username, password } = body.into_inner();

    let subject = match users.verify_password(&username, &password).await? {
        Some(subject) => subject,
        None => {
            tracing::info!(reason = AuthError::InvalidCredentials.kind(), "Login failed for user '{}'", username);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let credential = settings
        .signer
        .issue(&subject, clock.now())
        .map_err(|e| ApiError::Internal(format!("failed to sign credential: {}", e)))?;

    let mut response = HttpResponse::Ok().json(json!({ "status": "ok" }));
    cookies::attach(&mut response, &credential, &settings.cookie_policy)?;

    tracing::info!("User '{}' logged in, session expires at {}", subject, credential.expires_at());
    Ok(response)
}

/// Tell the browser to drop its session cookie.
///
/// Credentials are self-contained, so a copy of the cookie stays valid until it expires.
#[post("/logout")]
pub async fn logout(settings: web::Data<AuthSettings>) -> Result<HttpResponse, ApiError> {
    let mut response = HttpResponse::Ok().json(json!({ "status": "ok" }));
    cookies::clear(&mut response, &settings.cookie_policy)?;
    Ok(response)
}
