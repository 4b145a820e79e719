// web-server/src/middleware/cors.rs
use actix_cors::Cors;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderValue},
    Error, ResponseError,
};
use common::{AuthError, OriginAllowList};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::sync::Arc;

use crate::error::ApiError;

/// Preflight cache lifetime in seconds
const PREFLIGHT_MAX_AGE: usize = 600;

/// True only for an `Origin` header that exactly matches an allow-list entry.
pub fn origin_allowed(allowed: &OriginAllowList, origin: Option<&HeaderValue>) -> bool {
    let Some(origin) = origin.and_then(|value| value.to_str().ok()) else {
        return false;
    };
    allowed.is_allowed(origin)
}

/// CORS headers for allow-listed origins.
///
/// Allowed origins get credentialed CORS headers on preflight and actual
/// requests. This layer alone still forwards actual requests from other
/// origins, so it must sit inside an [`OriginGate`].
pub fn gate(allowed: Arc<OriginAllowList>) -> Cors {
    Cors::default()
        .allowed_origin_fn(move |origin, _head| origin_allowed(&allowed, Some(origin)))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Refuses any request whose `Origin` header is not on the allow-list.
///
/// The refusal is a plain 403 with no CORS headers and no handler runs.
/// Requests without an `Origin` header pass through untouched.
#[derive(Clone)]
pub struct OriginGate {
    allowed: Arc<OriginAllowList>,
}

impl OriginGate {
    pub fn new(allowed: Arc<OriginAllowList>) -> Self {
        Self { allowed }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OriginGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = OriginGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OriginGateMiddleware {
            service,
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct OriginGateMiddleware<S> {
    service: S,
    allowed: Arc<OriginAllowList>,
}

impl<S, B> Service<ServiceRequest> for OriginGateMiddleware<S>
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
        let origin = req.headers().get(header::ORIGIN);
        if origin.is_some() && !origin_allowed(&self.allowed, origin) {
            let err = AuthError::OriginNotAllowed;
            tracing::info!(
                origin = ?origin,
                method = %req.method(),
                path = %req.path(),
                reason = err.kind(),
                "Cross-origin request refused"
            );

            let response = req
                .into_response(ApiError::from(err).error_response())
                .map_into_right_body();
            return Box::pin(async move { Ok(response) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
