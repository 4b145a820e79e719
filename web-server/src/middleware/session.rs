// web-server/src/middleware/session.rs
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use common::{AuthError, AuthSettings, Clock, Principal};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::cookies;
use crate::error::ApiError;

/// Outcome of checking one request's session cookie.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionState {
    Authenticated(Principal),
    /// `None` when the request carried no session cookie at all
    Rejected(Option<AuthError>),
}

/// Guards a scope: only requests with a valid session cookie reach it.
#[derive(Clone)]
pub struct SessionGuard {
    settings: web::Data<AuthSettings>,
    clock: web::Data<dyn Clock>,
}

impl SessionGuard {
    pub fn new(settings: web::Data<AuthSettings>, clock: web::Data<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    /// Extract and verify the session cookie. No retry on failure.
    pub fn authenticate<R: HttpMessage>(&self, req: &R) -> SessionState {
        let Some(raw) = cookies::extract(req) else {
            return SessionState::Rejected(None);
        };

        match self.settings.signer.verify(&raw, self.clock.now()) {
            Ok(credential) => SessionState::Authenticated(Principal::from(&credential)),
            Err(err) => SessionState::Rejected(Some(err)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SessionGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGuardMiddleware {
            service,
            guard: self.clone(),
        }))
    }
}

pub struct SessionGuardMiddleware<S> {
    service: S,
    guard: SessionGuard,
}

impl<S, B> Service<ServiceRequest> for SessionGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.guard.authenticate(&req) {
            SessionState::Authenticated(principal) => {
                tracing::debug!(subject = %principal.subject, path = %req.path(), "Session authenticated");
                req.extensions_mut().insert(principal);

                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            SessionState::Rejected(reason) => {
                let reason = reason.map(|err| err.kind()).unwrap_or("missing");
                tracing::info!(path = %req.path(), reason, "Session rejected");

                let response = req
                    .into_response(ApiError::Unauthenticated.error_response())
                    .map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Extractor for handlers behind [`SessionGuard`].
pub struct Authenticated(pub Principal);

impl Authenticated {
    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Principal>()
                .cloned()
                .map(Authenticated)
                .ok_or(ApiError::Unauthenticated),
        )
    }
}
