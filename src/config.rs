use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// SMTP relay settings. Absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub verification_ttl_minutes: i64,
}

/// Upper bound for any minutes-valued setting (one week).
const MAX_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Parses `raw` when present, `default` otherwise. A present but unparseable value is an error.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got {v:?}")),
        None => Ok(default),
    }
}

/// Minutes in `1..=MAX_TTL_MINUTES`.
fn parse_ttl_minutes(key: &str, raw: Option<String>, default: i64) -> anyhow::Result<i64> {
    let minutes = parse_or(key, raw, default)?;
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{key} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}"
    );
    Ok(minutes)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "verifyd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "verifyd-users".into()),
            ttl_minutes: parse_ttl_minutes("JWT_TTL_MINUTES", env_opt("JWT_TTL_MINUTES"), 60)?,
        };
        let smtp = match env_opt("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", env_opt("SMTP_PORT"), 587)?,
                username: env_opt("SMTP_USERNAME"),
                password: env_opt("SMTP_PASSWORD"),
            }),
            None => None,
        };
        let mail = MailConfig {
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".into()),
            smtp,
        };
        Ok(Self {
            database_url,
            jwt,
            mail,
            verification_ttl_minutes: parse_ttl_minutes(
                "VERIFICATION_TTL_MINUTES",
                env_opt("VERIFICATION_TTL_MINUTES"),
                15,
            )?,
        })
    }
}
