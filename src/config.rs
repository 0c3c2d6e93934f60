use std::{env, fs, str::FromStr, time::Duration};

use dotenv::dotenv;

use crate::errors::ConfigError;

pub const DEFAULT_MAIL_API_URL: &str = "https://api.mailgun.net/v3/mg.nylas.com/messages.mime";
pub const DEFAULT_MAIL_FROM: &str = "send-availability@nylas.com";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    /// Fixed service address used as `From`; the organizer only goes into `Reply-To`.
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").ok_or(ConfigError::Missing { name: "DATABASE_URL" })?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            acquire_timeout: Duration::from_secs(parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?),
        };

        let api_key = match lookup("MAIL_API_KEY") {
            Some(key) => key,
            None => {
                let path = lookup("MAIL_API_KEY_FILE")
                    .ok_or(ConfigError::Missing { name: "MAIL_API_KEY" })?;
                read_secret(&path)?
            }
        };
        let mail = MailConfig {
            api_url: lookup("MAIL_API_URL").unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string()),
            api_key,
            from: lookup("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            timeout: Duration::from_secs(parse_or(&lookup, "MAIL_TIMEOUT_SECS", 10)?),
        };

        Ok(Config {
            host: lookup("BIND_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "BIND_PORT", 8888)?,
            database,
            mail,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn read_secret(path: &str) -> Result<String, ConfigError> {
    let secret = fs::read_to_string(path).map_err(|err| ConfigError::SecretFile {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    Ok(secret.trim().to_string())
}
