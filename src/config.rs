use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Token lifetime in seconds.
    pub token_ttl: u64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub default_payment_method: String,

    pub log_dir: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let token_ttl_raw = or_default("TOKEN_TTL", "7d");
        let token_ttl = parse_duration_secs(&token_ttl_raw)
            .with_context(|| format!("TOKEN_TTL has an invalid value '{token_ttl_raw}'"))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: required("SERVER_ADDR")?,
            token_ttl,

            rate_login_per_min: parse_var(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_var(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: parse_var(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: normalize_prefix(&or_default("API_PREFIX", "/api")),
            default_payment_method: or_default("DEFAULT_PAYMENT_METHOD", "Bank Transfer"),

            log_dir: or_default("LOG_DIR", "logs"),
            log_level: or_default("LOG_LEVEL", "debug"),
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// `/api/` and `api` both become `/api`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Accepts bare seconds or a number with an `s`, `m`, `h` or `d` suffix.
pub fn parse_duration_secs(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        Some(_) => (raw, 's'),
        None => bail!("empty duration"),
    };
    let value: u64 = digits.trim().parse().context("duration must start with a number")?;
    let factor = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        other => bail!("unknown duration unit '{other}'"),
    };
    let secs = value.checked_mul(factor).context("duration overflows")?;
    if secs == 0 {
        bail!("duration must be positive");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "memory://"),
        ("JWT_SECRET", "secret"),
        ("SERVER_ADDR", "127.0.0.1:8080"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.token_ttl, 7 * 86_400);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.rate_login_per_min, 60);
        assert_eq!(config.default_payment_method, "Bank Transfer");
    }

    #[test]
    fn missing_required_variable_is_named() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("SERVER_ADDR"));
    }

    #[test]
    fn bad_number_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LOGIN_PER_MIN", "lots"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration_secs("900").unwrap(), 900);
        assert_eq!(parse_duration_secs("15m").unwrap(), 900);
        assert_eq!(parse_duration_secs("2H").unwrap(), 7_200);
        assert!(parse_duration_secs("0").is_err());
        assert!(parse_duration_secs("3w").is_err());
        assert!(parse_duration_secs("d").is_err());
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/"), "");
    }
}
