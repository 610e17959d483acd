use std::{env, time::Duration};

use thiserror::Error;

/// Origins the forum front-end is served from. Used when `CORS_ORIGINS` is unset.
const DEFAULT_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:5174",
    "https://buzz-breeze.web.app",
    "https://buzz-breeze.firebaseapp.com",
];

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TOKEN_TTL_DAYS: u64 = 365;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers via `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Deployment mode. Drives the session cookie's security attributes and log format.
    pub env: Env,
    // HMAC secret used to sign and verify session credentials. Never sent to clients.
    pub jwt_secret: String,
    // Postgres connection string. Optional locally, where the in-memory repository is used.
    pub db_url: Option<String>,
    pub port: u16,
    // Lifetime of an issued session credential.
    pub token_ttl: Duration,
    // Origins allowed to make credentialed cross-origin requests.
    pub allowed_origins: Vec<String>,
}

/// Env
///
/// Explicit deployment mode. `Production` hardens the session cookie (`Secure`,
/// `SameSite=None` for the cross-site front-end); `Local` keeps it same-site only.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    pub fn parse(value: &str) -> Self {
        match value {
            "production" => Env::Production,
            _ => Env::Local,
        }
    }

    pub fn is_production(self) -> bool {
        self == Env::Production
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl AppConfig {
    /// Builds a configuration with defaults for everything except the mode and secret.
    /// Used by tests and embedders that do not read the process environment.
    pub fn new(env: Env, jwt_secret: impl Into<String>) -> Self {
        Self {
            env,
            jwt_secret: jwt_secret.into(),
            db_url: None,
            port: DEFAULT_PORT,
            token_ttl: default_ttl(),
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }

    /// load
    ///
    /// Reads the configuration from environment variables. Fails fast when the signing
    /// secret is missing in any mode, or when `DATABASE_URL` is missing in production.
    pub fn load() -> Result<Self, ConfigError> {
        let env = Env::parse(&env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()));

        let jwt_secret = non_empty("ACCESS_TOKEN_SECRET").ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?;

        let db_url = non_empty("DATABASE_URL");
        if env.is_production() && db_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let port = match non_empty("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let token_ttl = match non_empty("TOKEN_TTL_DAYS") {
            Some(value) => match value.parse::<u64>().ok().filter(|d| *d > 0).and_then(days) {
                Some(ttl) => ttl,
                None => return Err(ConfigError::Invalid { var: "TOKEN_TTL_DAYS", value }),
            },
            None => default_ttl(),
        };

        let allowed_origins = match non_empty("CORS_ORIGINS") {
            Some(list) => {
                let origins: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                // Credentialed CORS cannot use a wildcard origin.
                if origins.iter().any(|o| o == "*") {
                    return Err(ConfigError::Invalid { var: "CORS_ORIGINS", value: list });
                }
                origins
            }
            None => DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            env,
            jwt_secret,
            db_url,
            port,
            token_ttl,
            allowed_origins,
        })
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// `None` when the lifetime does not fit in seconds.
fn days(n: u64) -> Option<Duration> {
    n.checked_mul(SECS_PER_DAY).map(Duration::from_secs)
}

fn default_ttl() -> Duration {
    Duration::from_secs(DEFAULT_TOKEN_TTL_DAYS * SECS_PER_DAY)
}
