use std::{env::var, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;

const DEFAULT_MESSAGE_RATE: usize = 2;
const DEFAULT_RUNS_EVERY: Duration = Duration::from_secs(120);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub webhook: WebhookConfig,
    pub scheduler: SchedulerConfig,
    pub app: AppConfig,
    /// Corrections applied to invalid settings; logged once tracing is up.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Caching is disabled when unset.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub character_limit: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Batch size per tick and ceiling on workers per batch.
    pub message_rate: usize,
    pub runs_every: Duration,
    /// Subtracted from `runs_every` to form each batch deadline.
    pub grace_period: Duration,
    pub job_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub scheduler_autostart: bool,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Config {
    pub fn try_parse() -> Result<Config, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let env = Env { lookup: &lookup };

        let scheduler = SchedulerConfig {
            message_rate: env.parse_or::<i64>("SCHEDULER_MESSAGE_RATE", DEFAULT_MESSAGE_RATE as i64)?.max(0)
                as usize,
            runs_every: env.duration_or(
                "SCHEDULER_RUNS_EVERY_MS",
                "SCHEDULER_RUNS_EVERY_SECS",
                DEFAULT_RUNS_EVERY,
            )?,
            grace_period: env.duration_or(
                "SCHEDULER_GRACE_PERIOD_MS",
                "SCHEDULER_GRACE_PERIOD_SECS",
                DEFAULT_GRACE_PERIOD,
            )?,
            job_timeout: env.duration_or(
                "SCHEDULER_JOB_TIMEOUT_MS",
                "SCHEDULER_JOB_TIMEOUT_SECS",
                DEFAULT_JOB_TIMEOUT,
            )?,
        };
        let (scheduler, warnings) = scheduler.normalized();

        Ok(Config {
            server: ServerConfig {
                host: env.string_or("SERVER_HOST", "0.0.0.0"),
                port: env.parse_or("SERVER_PORT", 8080)?,
                shutdown_timeout: env.secs_or("SERVER_SHUTDOWN_TIMEOUT_SECS", Duration::from_secs(10))?,
            },
            database: DatabaseConfig {
                url: env.required("DATABASE_URL")?,
                max_connections: env.parse_or("DATABASE_MAX_CONNS", 10)?,
            },
            redis: RedisConfig {
                url: env.optional("REDIS_URL"),
            },
            webhook: WebhookConfig {
                url: env.required("WEBHOOK_URL")?,
                character_limit: env.parse_or("WEBHOOK_CHARACTER_LIMIT", 160)?,
                timeout: env.secs_or("WEBHOOK_TIMEOUT_SECS", Duration::from_secs(10))?,
            },
            scheduler,
            app: AppConfig {
                environment: env.string_or("APP_ENVIRONMENT", "development"),
                scheduler_autostart: env.parse_or("SCHEDULER_AUTOSTART", true)?,
            },
            warnings,
        })
    }
}

impl SchedulerConfig {
    /// Replaces unusable values with defaults instead of rejecting them.
    pub fn normalized(mut self) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        if self.message_rate == 0 {
            warnings.push(format!(
                "scheduler message rate set to 0 or less, defaulting to {DEFAULT_MESSAGE_RATE}"
            ));
            self.message_rate = DEFAULT_MESSAGE_RATE;
        }
        if self.runs_every.is_zero() {
            warnings.push(format!(
                "scheduler interval set to 0 or less, defaulting to {}s",
                DEFAULT_RUNS_EVERY.as_secs()
            ));
            self.runs_every = DEFAULT_RUNS_EVERY;
        }
        if self.grace_period.is_zero() || self.grace_period >= self.runs_every {
            let fallback = if DEFAULT_GRACE_PERIOD < self.runs_every {
                DEFAULT_GRACE_PERIOD
            } else {
                self.runs_every / 2
            };
            warnings.push(format!(
                "scheduler grace period must be between 0 and the interval, defaulting to {}ms",
                fallback.as_millis()
            ));
            self.grace_period = fallback;
        }
        if self.job_timeout.is_zero() {
            warnings.push(format!(
                "scheduler job timeout set to 0 or less, defaulting to {}s",
                DEFAULT_JOB_TIMEOUT.as_secs()
            ));
            self.job_timeout = DEFAULT_JOB_TIMEOUT;
        }

        (self, warnings)
    }

    /// Time a batch may spend before the next tick is due.
    pub fn batch_budget(&self) -> Duration {
        match self.runs_every.checked_sub(self.grace_period) {
            Some(budget) if !budget.is_zero() => budget,
            _ => self.runs_every,
        }
    }

    /// Workers per batch: the message rate, capped at twice the available
    /// parallelism since the work is I/O bound.
    pub fn worker_count(&self) -> usize {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        self.message_rate.min(2 * cpus).max(1)
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::Invalid {
                key,
                reason: format!("{raw:?}: {err}"),
            }),
            None => Ok(default),
        }
    }

    // Negative values collapse to zero and are corrected by `normalized`.
    fn secs_or(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.parse_or::<i64>(key, default.as_secs() as i64)?;
        Ok(Duration::from_secs(secs.max(0) as u64))
    }

    /// Millisecond key wins over the seconds key for sub-second periods.
    fn duration_or(
        &self,
        millis_key: &'static str,
        secs_key: &'static str,
        default: Duration,
    ) -> Result<Duration, ConfigError> {
        match self.optional(millis_key) {
            Some(_) => {
                let millis = self.parse_or::<i64>(millis_key, 0)?;
                Ok(Duration::from_millis(millis.max(0) as u64))
            }
            None => self.secs_or(secs_key, default),
        }
    }
}
