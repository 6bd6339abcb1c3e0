use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// One year.
const MAX_TOKEN_LIFETIME_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Base64 key material; validated later by `resolve_signing_key`.
    pub token_key: Option<String>,
    pub token_lifetime_hours: i64,
    pub allow_ephemeral_key: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset variables take their defaults; set but unparseable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("NATTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "NATTER_PORT", 3000u16)?;
        let db_path = lookup("NATTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("natter.db"));
        let token_key = lookup("NATTER_TOKEN_KEY").filter(|k| !k.trim().is_empty());

        let token_lifetime_hours = parse_or(&lookup, "NATTER_TOKEN_LIFETIME_HOURS", 24i64)?;
        if !(1..=MAX_TOKEN_LIFETIME_HOURS).contains(&token_lifetime_hours) {
            bail!(
                "NATTER_TOKEN_LIFETIME_HOURS must be between 1 and {MAX_TOKEN_LIFETIME_HOURS}, got {token_lifetime_hours}"
            );
        }

        let allow_ephemeral_key = match lookup("NATTER_ALLOW_EPHEMERAL_KEY") {
            None => false,
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("NATTER_ALLOW_EPHEMERAL_KEY: not a boolean: {raw:?}"))?,
        };

        Ok(Self {
            host,
            port,
            db_path,
            token_key,
            token_lifetime_hours,
            allow_ephemeral_key,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: cannot parse {raw:?}")),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
