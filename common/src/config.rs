// common/src/config.rs
use crate::error::ConfigError;
use crate::signer::CredentialSigner;
use config::{Config as ConfigFile, Environment, File};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["changeme", "change-me", "secret", "dev_secret", "dev_token", "your-secret-key"];

/// Ten years; keeps `exp` well inside timestamp range.
const MAX_EXPIRE_HOURS: i64 = 24 * 365 * 10;

/// Raw process configuration, as loaded from files and environment.
///
/// Keys match the environment variable names, lowercased
/// (`SECRET_KEY` -> `secret_key`).
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,
    #[serde(default = "default_expire_hours")]
    pub access_token_expire_hours: i64,
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
    #[serde(default = "default_cookie_samesite")]
    pub cookie_samesite: String,
    /// Allowed origins, from a comma separated string or a list
    #[serde(default, deserialize_with = "deserialize_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_web_server_addr")]
    pub web_server_addr: String,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: usize,
    #[serde(default = "default_login_rate_window")]
    pub login_rate_window_seconds: u64,
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_expire_hours() -> i64 {
    1
}

fn default_cookie_secure() -> bool {
    true
}

fn default_cookie_samesite() -> String {
    "lax".to_string()
}

fn default_web_server_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_login_rate_limit() -> usize {
    5
}

fn default_login_rate_window() -> u64 {
    60
}

fn default_run_mode() -> String {
    "development".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OriginsValue {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_origins<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let entries = match OriginsValue::deserialize(deserializer)? {
        OriginsValue::Joined(raw) => vec![raw],
        OriginsValue::List(list) => list,
    };

    Ok(entries
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect())
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("access_token_expire_hours", &self.access_token_expire_hours)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_samesite", &self.cookie_samesite)
            .field("cors_origins", &self.cors_origins)
            .field("web_server_addr", &self.web_server_addr)
            .field("admin_username", &self.admin_username)
            .field("login_rate_limit", &self.login_rate_limit)
            .field("login_rate_window_seconds", &self.login_rate_window_seconds)
            .field("run_mode", &self.run_mode)
            .finish()
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let source = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Unprefixed, so SECRET_KEY, CORS_ORIGINS etc. are read as-is
            .add_source(Environment::default())
            .build()?;

        Self::from_source(source)
    }

    pub fn from_source(source: ConfigFile) -> Result<Self, ConfigError> {
        Ok(source.try_deserialize()?)
    }

    pub fn is_production(&self) -> bool {
        self.run_mode.eq_ignore_ascii_case("production")
    }

    /// Validate the auth-related settings and build the process-wide values.
    pub fn auth_settings(&self) -> Result<AuthSettings, ConfigError> {
        let secret = self
            .secret_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        if PLACEHOLDER_SECRETS.iter().any(|p| p.eq_ignore_ascii_case(secret)) {
            if self.is_production() {
                return Err(ConfigError::DefaultSecret(self.run_mode.clone()));
            }
            tracing::warn!("SECRET_KEY is a placeholder value; do not use it outside development");
        }

        let algorithm = Algorithm::from_str(&self.jwt_algorithm.trim().to_ascii_uppercase())
            .map_err(|_| ConfigError::UnsupportedAlgorithm(self.jwt_algorithm.clone()))?;

        if !(1..=MAX_EXPIRE_HOURS).contains(&self.access_token_expire_hours) {
            return Err(ConfigError::InvalidLifetime);
        }
        let lifetime = chrono::Duration::hours(self.access_token_expire_hours);

        let signer = CredentialSigner::new(secret.as_bytes(), algorithm, lifetime)?;
        let cookie_policy = CookiePolicy::new(self.cookie_secure, self.cookie_samesite.parse()?)?;
        let allowed_origins = self.cors_origins.iter().map(String::as_str).collect();

        Ok(AuthSettings {
            signer,
            cookie_policy,
            allowed_origins,
        })
    }
}

/// Validated, immutable settings shared by every request.
#[derive(Debug)]
pub struct AuthSettings {
    pub signer: CredentialSigner,
    pub cookie_policy: CookiePolicy,
    pub allowed_origins: OriginAllowList,
}

/// `SameSite` attribute of the session cookie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSitePolicy::Strict),
            "lax" => Ok(SameSitePolicy::Lax),
            "none" => Ok(SameSitePolicy::None),
            _ => Err(ConfigError::InvalidSameSite(s.to_string())),
        }
    }
}

impl fmt::Display for SameSitePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SameSitePolicy::Strict => "strict",
            SameSitePolicy::Lax => "lax",
            SameSitePolicy::None => "none",
        };
        f.write_str(name)
    }
}

/// Security attributes of the session cookie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookiePolicy {
    secure: bool,
    same_site: SameSitePolicy,
}

impl CookiePolicy {
    pub fn new(secure: bool, same_site: SameSitePolicy) -> Result<Self, ConfigError> {
        // Browsers drop SameSite=None cookies that are not Secure.
        if same_site == SameSitePolicy::None && !secure {
            return Err(ConfigError::InsecureCrossSiteCookie);
        }
        if !secure {
            tracing::warn!("COOKIE_SECURE=false: session cookie will be sent over plain HTTP (local development only)");
        }
        Ok(Self { secure, same_site })
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn same_site(&self) -> SameSitePolicy {
        self.same_site
    }

    /// The session cookie is never readable by page scripts.
    pub const fn http_only(&self) -> bool {
        true
    }
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSitePolicy::Lax,
        }
    }
}

/// Origins allowed to make credentialed cross-origin requests.
///
/// Matching is exact: no wildcards, no suffixes, no normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: HashSet<String>,
}

impl OriginAllowList {
    /// Parse a comma separated list, dropping blank entries.
    pub fn parse(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect()
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OriginAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            origins: iter.into_iter().map(Into::into).collect(),
        }
    }
}
