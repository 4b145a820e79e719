// web-server/src/cookies.rs
use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpMessage, HttpResponse};
use common::{CookiePolicy, Credential, SameSitePolicy};

/// Cookie name for the session credential
pub const SESSION_COOKIE_NAME: &str = "session";

fn same_site(policy: &CookiePolicy) -> SameSite {
    match policy.same_site() {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Build the session cookie for `credential` under `policy`.
pub fn session_cookie(credential: &Credential, policy: &CookiePolicy) -> Cookie<'static> {
    let lifetime = credential.expires_at().timestamp() - credential.issued_at().timestamp();

    let mut cookie = Cookie::build(SESSION_COOKIE_NAME, credential.as_str().to_string())
        .path("/")
        .http_only(policy.http_only())
        .secure(policy.secure())
        .same_site(same_site(policy))
        .max_age(CookieDuration::seconds(lifetime))
        .finish();

    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(credential.expires_at().timestamp()) {
        cookie.set_expires(expires);
    }
    cookie
}

/// Attach the session cookie to an outgoing response.
pub fn attach(
    response: &mut HttpResponse,
    credential: &Credential,
    policy: &CookiePolicy,
) -> Result<(), actix_web::error::HttpError> {
    response.add_cookie(&session_cookie(credential, policy))
}

/// Attach a cookie that makes the browser drop its session cookie.
pub fn clear(response: &mut HttpResponse, policy: &CookiePolicy) -> Result<(), actix_web::error::HttpError> {
    let mut cookie = Cookie::build(SESSION_COOKIE_NAME, "")
        .path("/")
        .http_only(policy.http_only())
        .secure(policy.secure())
        .same_site(same_site(policy))
        .finish();
    cookie.make_removal();
    response.add_cookie(&cookie)
}

/// Raw session credential from the request's cookie header, if present and non-empty.
///
/// Every `Cookie` header is scanned; pairs that fail to parse are skipped.
pub fn extract<R: HttpMessage>(req: &R) -> Option<String> {
    req.headers()
        .get_all(header::COOKIE)
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| Cookie::parse(pair).ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::{TimeZone, Utc};
    use common::CredentialSigner;
    use jsonwebtoken::Algorithm;

    fn credential() -> Credential {
        let signer = CredentialSigner::new(b"abc", Algorithm::HS256, chrono::Duration::hours(1)).unwrap();
        signer.issue("alice", Utc.timestamp_opt(1_700_000_000, 0).unwrap()).unwrap()
    }

    fn set_cookie_header(policy: CookiePolicy) -> String {
        let mut response = HttpResponse::Ok().finish();
        attach(&mut response, &credential(), &policy).unwrap();
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_attach_single_opaque_cookie() {
        let cred = credential();
        let mut response = HttpResponse::Ok().finish();
        attach(&mut response, &cred, &CookiePolicy::default()).unwrap();

        let cookies: Vec<_> = response.cookies().collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), SESSION_COOKIE_NAME);
        assert_eq!(cookies[0].value(), cred.as_str());
        assert_eq!(cookies[0].path(), Some("/"));
        assert_eq!(cookies[0].max_age(), Some(CookieDuration::seconds(3600)));
        assert_eq!(
            cookies[0].expires_datetime().map(|dt| dt.unix_timestamp()),
            Some(cred.expires_at().timestamp())
        );
    }

    #[test]
    fn test_policy_matrix() {
        let dev = set_cookie_header(CookiePolicy::new(false, SameSitePolicy::Lax).unwrap());
        assert!(dev.contains("HttpOnly"));
        assert!(!dev.contains("Secure"));
        assert!(dev.contains("SameSite=Lax"));

        let prod = set_cookie_header(CookiePolicy::new(true, SameSitePolicy::Lax).unwrap());
        assert!(prod.contains("HttpOnly"));
        assert!(prod.contains("Secure"));
        assert!(prod.contains("SameSite=Lax"));

        let strict = set_cookie_header(CookiePolicy::new(true, SameSitePolicy::Strict).unwrap());
        assert!(strict.contains("HttpOnly"));
        assert!(strict.contains("Secure"));
        assert!(strict.contains("SameSite=Strict"));

        let cross_site = set_cookie_header(CookiePolicy::new(true, SameSitePolicy::None).unwrap());
        assert!(cross_site.contains("HttpOnly"));
        assert!(cross_site.contains("Secure"));
        assert!(cross_site.contains("SameSite=None"));
    }

    #[test]
    fn test_clear_expires_cookie() {
        let mut response = HttpResponse::Ok().finish();
        clear(&mut response, &CookiePolicy::default()).unwrap();

        let cookie = response.cookies().next().unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn test_extract() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE_NAME, "a.b.c"))
            .to_http_request();
        assert_eq!(extract(&req).as_deref(), Some("a.b.c"));

        let empty = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE_NAME, ""))
            .to_http_request();
        assert_eq!(extract(&empty), None);

        let other = TestRequest::default()
            .cookie(Cookie::new("theme", "dark"))
            .to_http_request();
        assert_eq!(extract(&other), None);

        assert_eq!(extract(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn test_extract_from_shared_cookie_header() {
        let req = TestRequest::default()
            .insert_header((header::COOKIE, "theme=dark; session=a.b.c; lang=en"))
            .to_srv_request();
        assert_eq!(extract(&req).as_deref(), Some("a.b.c"));

        let garbage_first = TestRequest::default()
            .insert_header((header::COOKIE, "=; ;theme; session=x.y.z"))
            .to_srv_request();
        assert_eq!(extract(&garbage_first).as_deref(), Some("x.y.z"));

        let lookalike = TestRequest::default()
            .insert_header((header::COOKIE, "session_old=a.b.c; my_session=d.e.f"))
            .to_srv_request();
        assert_eq!(extract(&lookalike), None);
    }
}
