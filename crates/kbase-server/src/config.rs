use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use tracing::warn;

use kbase_api::AuthSettings;

const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";

pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub auth: AuthSettings,
    /// `None` keeps mail in the log.
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("KBASE_HOST", "0.0.0.0");
        let port: u16 = parsed(&lookup, "KBASE_PORT", 5000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("KBASE_HOST/KBASE_PORT do not form an address: {}:{}", host, port))?;

        let jwt_secret = var("KBASE_JWT_SECRET", PLACEHOLDER_SECRET);
        if jwt_secret == PLACEHOLDER_SECRET {
            warn!("KBASE_JWT_SECRET is the development placeholder; set a real secret in production");
        }

        let token_ttl = ttl("KBASE_TOKEN_TTL_DAYS", parsed(&lookup, "KBASE_TOKEN_TTL_DAYS", 7)?, TimeDelta::try_days)?;
        let otp_ttl = ttl("KBASE_OTP_TTL_MINUTES", parsed(&lookup, "KBASE_OTP_TTL_MINUTES", 10)?, TimeDelta::try_minutes)?;
        let require_email_verification: bool = parsed(&lookup, "KBASE_REQUIRE_EMAIL_VERIFICATION", false)?;

        let mail = lookup("KBASE_MAIL_API_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|api_url| MailConfig {
                api_url,
                api_key: var("KBASE_MAIL_API_KEY", ""),
                from: var("KBASE_MAIL_FROM", "Knowledge Base <no-reply@localhost>"),
            });

        Ok(Self {
            addr,
            db_path: PathBuf::from(var("KBASE_DB_PATH", "kbase.db")),
            auth: AuthSettings {
                jwt_secret,
                token_ttl,
                otp_ttl,
                require_email_verification,
            },
            mail,
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// A TTL must be positive and small enough that `now + ttl` is representable.
fn ttl(key: &str, amount: i64, unit: fn(i64) -> Option<TimeDelta>) -> Result<TimeDelta> {
    unit(amount)
        .filter(|ttl| *ttl > TimeDelta::zero())
        .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
        .with_context(|| format!("invalid value for {}: {} is out of range", key, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr.port(), 5000);
        assert_eq!(cfg.db_path, PathBuf::from("kbase.db"));
        assert_eq!(cfg.auth.token_ttl, chrono::Duration::days(7));
        assert_eq!(cfg.auth.otp_ttl, chrono::Duration::minutes(10));
        assert!(!cfg.auth.require_email_verification);
        assert!(cfg.mail.is_none());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("KBASE_PORT", "8080"),
            ("KBASE_OTP_TTL_MINUTES", "3"),
            ("KBASE_REQUIRE_EMAIL_VERIFICATION", "true"),
            ("KBASE_MAIL_API_URL", "https://mail.example/send"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.auth.otp_ttl, chrono::Duration::minutes(3));
        assert!(cfg.auth.require_email_verification);
        let mail = cfg.mail.unwrap();
        assert_eq!(mail.from, "Knowledge Base <no-reply@localhost>");
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config(&[("KBASE_PORT", "eighty")]).err().unwrap();
        assert!(err.to_string().contains("KBASE_PORT"));
    }

    #[test]
    fn out_of_range_ttls_are_errors() {
        let err = config(&[("KBASE_TOKEN_TTL_DAYS", "9999999999999")]).err().unwrap();
        assert!(err.to_string().contains("KBASE_TOKEN_TTL_DAYS"));

        let err = config(&[("KBASE_TOKEN_TTL_DAYS", "100000000000")]).err().unwrap();
        assert!(err.to_string().contains("KBASE_TOKEN_TTL_DAYS"));

        let err = config(&[("KBASE_OTP_TTL_MINUTES", "9223372036854775807")]).err().unwrap();
        assert!(err.to_string().contains("KBASE_OTP_TTL_MINUTES"));

        let err = config(&[("KBASE_OTP_TTL_MINUTES", "0")]).err().unwrap();
        assert!(err.to_string().contains("KBASE_OTP_TTL_MINUTES"));
    }
}
