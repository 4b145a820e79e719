// web-server/src/middleware/rate_limiter.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    Error, ResponseError,
};
use dashmap::DashMap;
use futures_util::future::{LocalBoxFuture, Ready, ready};

use crate::error::ApiError;

/// Per-client sliding window limiter for the given path prefixes.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    store: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            paths,
            max_requests,
            window,
            store: Arc::new(DashMap::new()),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn is_rate_limited(&self, client: &str, now: Instant) -> bool {
        // Drop clients whose attempts have all aged out
        self.store.retain(|_, attempts| {
            attempts.retain(|time| now.duration_since(*time) < self.window);
            !attempts.is_empty()
        });

        let mut attempts = self.store.entry(client.to_string()).or_default();
        if attempts.len() >= self.max_requests {
            true
        } else {
            attempts.push(now);
            false
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Preflights are answered by the CORS gate and never count as attempts
        if self.limiter.applies_to(req.path()) && *req.method() != actix_web::http::Method::OPTIONS {
            // Socket address only; Forwarded / X-Forwarded-For are client controlled
            let client = req.peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            if self.limiter.is_rate_limited(&client, Instant::now()) {
                tracing::warn!("Rate limit exceeded for client: {}", client);

                let retry_after = self.limiter.window.as_secs();
                let response = req
                    .into_response(ApiError::RateLimited { retry_after }.error_response())
                    .map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            fut.await.map(ServiceResponse::map_into_left_body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::cors;
    use actix_web::http::{header, StatusCode};
    use actix_web::test::{call_service, init_service, TestRequest};
    use actix_web::{web, App, HttpResponse};
    use common::OriginAllowList;
    use std::net::SocketAddr;

    fn peer(addr: &str) -> SocketAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_window() {
        let limiter = RateLimiter::new(vec!["/login".into()], 2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(!limiter.is_rate_limited("1.2.3.4", start));
        assert!(!limiter.is_rate_limited("1.2.3.4", start));
        assert!(limiter.is_rate_limited("1.2.3.4", start));
        // Other clients are counted separately
        assert!(!limiter.is_rate_limited("5.6.7.8", start));
        // Attempts age out of the window
        assert!(!limiter.is_rate_limited("1.2.3.4", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_idle_clients_are_pruned() {
        let limiter = RateLimiter::new(vec!["/login".into()], 2, Duration::from_secs(60));
        let start = Instant::now();

        for n in 0..50 {
            limiter.is_rate_limited(&format!("10.0.0.{}", n), start);
        }
        assert_eq!(limiter.store.len(), 50);

        limiter.is_rate_limited("1.2.3.4", start + Duration::from_secs(61));
        assert_eq!(limiter.store.len(), 1);
    }

    #[actix_web::test]
    async fn test_only_limits_configured_paths() {
        let limiter = RateLimiter::new(vec!["/login".into()], 1, Duration::from_secs(60));
        let app = init_service(
            App::new()
                .wrap(limiter)
                .route("/login", web::post().to(HttpResponse::Ok))
                .route("/health", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let first = call_service(&app, TestRequest::post().uri("/login").to_request()).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = call_service(&app, TestRequest::post().uri("/login").to_request()).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get(header::RETRY_AFTER).unwrap(), "60");

        for _ in 0..3 {
            let resp = call_service(&app, TestRequest::get().uri("/health").to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn test_forwarded_headers_do_not_reset_the_limit() {
        let limiter = RateLimiter::new(vec!["/login".into()], 1, Duration::from_secs(60));
        let store = limiter.store.clone();
        let app = init_service(
            App::new()
                .wrap(limiter)
                .route("/login", web::post().to(HttpResponse::Ok)),
        )
        .await;

        let mut accepted = 0;
        for n in 0..20 {
            let req = TestRequest::post()
                .uri("/login")
                .peer_addr(peer("203.0.113.7:40000"))
                .insert_header(("x-forwarded-for", format!("198.51.100.{}", n)))
                .insert_header((header::FORWARDED, format!("for=198.51.100.{}", n)))
                .to_request();
            if call_service(&app, req).await.status() == StatusCode::OK {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.len(), 1);

        // A different socket peer has its own budget
        let req = TestRequest::post()
            .uri("/login")
            .peer_addr(peer("203.0.113.8:40000"))
            .to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_limited_response_is_readable_by_allowed_origin() {
        let frontend = "http://localhost:8080";
        let limiter = RateLimiter::new(vec!["/login".into()], 1, Duration::from_secs(60));
        let app = init_service(
            App::new()
                .wrap(limiter)
                .wrap(cors::gate(Arc::new(OriginAllowList::parse(frontend))))
                .route("/login", web::post().to(HttpResponse::Ok)),
        )
        .await;

        let login = || {
            TestRequest::post()
                .uri("/login")
                .insert_header((header::ORIGIN, frontend))
                .to_request()
        };
        assert_eq!(call_service(&app, login()).await.status(), StatusCode::OK);

        let resp = call_service(&app, login()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), frontend);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}
