use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::PasswordPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,

    /// Unset runs on the in-memory store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
    pub max_conflict_retries: u32,

    /// Unset runs on the in-memory cache unless `cache_disabled`
    pub redis_url: Option<String>,
    pub cache_disabled: bool,
    /// `CACHE_TTL_SECS=0` keeps entries until invalidated
    pub cache_ttl: Option<Duration>,
    pub cache_op_timeout: Duration,

    pub seed_demo_data: bool,

    pub argon_memory_kb: u32,
    pub argon_iterations: u32,
    pub argon_parallelism: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8080)?,

            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or("DB_ACQUIRE_TIMEOUT_SECS", 3)?),
            lock_timeout: Duration::from_millis(parse_or("LOCK_TIMEOUT_MS", 2000)?),
            statement_timeout: Duration::from_millis(parse_or("STATEMENT_TIMEOUT_MS", 5000)?),
            max_conflict_retries: parse_or("MAX_CONFLICT_RETRIES", 3)?,

            redis_url: non_empty("REDIS_URL"),
            cache_disabled: parse_bool_or("CACHE_DISABLED", false)?,
            cache_ttl: match parse_or::<u64>("CACHE_TTL_SECS", 300)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            cache_op_timeout: Duration::from_millis(parse_or("CACHE_OP_TIMEOUT_MS", 250)?),

            seed_demo_data: parse_bool_or("SEED_DEMO_DATA", true)?,

            argon_memory_kb: parse_or("ARGON_MEMORY_KB", 19_456)?,
            argon_iterations: parse_or("ARGON_ITERATIONS", 2)?,
            argon_parallelism: parse_or("ARGON_PARALLELISM", 1)?,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            memory_kb: self.argon_memory_kb,
            iterations: self.argon_iterations,
            parallelism: self.argon_parallelism,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn parse_bool_or(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty(name) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
        None => Ok(default),
    }
}
