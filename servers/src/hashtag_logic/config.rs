use clap::{Parser, ValueEnum};
use lib_common::ingestors::{DeliveryMode, RateLimitPolicy, SessionSettings, StreamError};
use lib_common::loggers::LogSettings;
use lib_common::retrieve::stream_client::{DEFAULT_STREAM_URL, DEFAULT_USER_AGENT};
use lib_common::retrieve::StreamEndpoint;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const APP_NAME: &str = "server_hashtags";
pub const DEFAULT_CONFIG_FILE: &str = "server_hashtags.conf";
/// Variable name used by earlier deployments.
pub const LEGACY_TOKEN_ENV: &str = "TwitterBearerToken";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No bearer token configured; set TWITTER_BEARER_TOKEN")]
    MissingToken,

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error(transparent)]
    Endpoint(#[from] StreamError),
}

#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Count on a dedicated consumer task fed by a queue.
    Channel,
    /// Count on the reader task.
    Inline,
}

impl From<QueueMode> for DeliveryMode {
    fn from(mode: QueueMode) -> Self {
        match mode {
            QueueMode::Channel => DeliveryMode::Channel,
            QueueMode::Inline => DeliveryMode::Inline,
        }
    }
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Live top-10 hashtag tracker for the sampled tweet stream", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "HASHTAGS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "HASHTAGS_STREAM_URL", help = "Streaming endpoint URL.")]
    pub stream_url: Option<String>,

    #[clap(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true, help = "Bearer token, URL-escaped or plain.")]
    pub bearer_token: Option<String>,

    #[clap(long, env = "HASHTAGS_USER_AGENT", help = "User-Agent header sent to the endpoint.")]
    pub user_agent: Option<String>,

    #[clap(long, env = "HASHTAGS_MAX_RETRY_ATTEMPTS", help = "Consecutive failed attempts before giving up.")]
    pub max_retry_attempts: Option<u32>,

    #[clap(long, env = "HASHTAGS_BACKOFF_UNIT_MS", help = "Backoff unit in milliseconds; retry n waits unit * 2^n.")]
    pub backoff_unit_ms: Option<u64>,

    #[clap(long, env = "HASHTAGS_RETRY_RATE_LIMITED", help = "Retry with backoff on 429 instead of stopping (true/false).")]
    pub retry_rate_limited: Option<bool>,

    #[clap(long, env = "HASHTAGS_MAX_FRAME_BYTES", help = "Largest partial frame kept while waiting for the rest of it.")]
    pub max_frame_bytes: Option<usize>,

    #[clap(long, env = "HASHTAGS_QUEUE_MODE", value_enum, help = "Where events are counted.")]
    pub queue_mode: Option<QueueMode>,

    #[clap(long, env = "HASHTAGS_REPORT_INTERVAL_SECS", help = "Seconds between statistics reports.")]
    pub report_interval_secs: Option<u64>,

    #[clap(long, env = "HASHTAGS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "HASHTAGS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, fatal).")]
    pub log_level: Option<String>,

    #[clap(long, env = "HASHTAGS_LOG_JSON", help = "Write the log file as JSON lines (true/false).")]
    pub log_json: Option<bool>,
}

/// Everything the binary needs, validated and in library types.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub endpoint: StreamEndpoint,
    pub session: SessionSettings,
    pub delivery: DeliveryMode,
    pub report_interval: Duration,
    pub logging: LogSettings,
}

impl Config {
    pub fn defaults() -> Config {
        let session = SessionSettings::default();
        Config {
            stream_url: Some(DEFAULT_STREAM_URL.to_string()),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            max_retry_attempts: Some(session.max_retry_attempts),
            backoff_unit_ms: Some(session.backoff_unit.as_millis() as u64),
            retry_rate_limited: Some(false),
            max_frame_bytes: Some(session.max_frame_bytes),
            queue_mode: Some(QueueMode::Channel),
            report_interval_secs: Some(60),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_json: Some(false),
            ..Default::default()
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            stream_url: other.stream_url.or(self.stream_url),
            bearer_token: other.bearer_token.or(self.bearer_token),
            user_agent: other.user_agent.or(self.user_agent),
            max_retry_attempts: other.max_retry_attempts.or(self.max_retry_attempts),
            backoff_unit_ms: other.backoff_unit_ms.or(self.backoff_unit_ms),
            retry_rate_limited: other.retry_rate_limited.or(self.retry_rate_limited),
            max_frame_bytes: other.max_frame_bytes.or(self.max_frame_bytes),
            queue_mode: other.queue_mode.or(self.queue_mode),
            report_interval_secs: other.report_interval_secs.or(self.report_interval_secs),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_json: other.log_json.or(self.log_json),
        }
    }

    /// Validates the merged configuration and converts it into library settings.
    pub fn tracker_settings(&self) -> Result<TrackerSettings, ConfigError> {
        let defaults = Config::defaults();
        let pick = |value: &Option<u64>, fallback: &Option<u64>| value.or(*fallback).unwrap_or_default();

        let token = self
            .bearer_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let url = self.stream_url.as_deref().unwrap_or(DEFAULT_STREAM_URL);
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let endpoint = StreamEndpoint::new(url, token)?.with_user_agent(user_agent);

        let max_retry_attempts = self
            .max_retry_attempts
            .or(defaults.max_retry_attempts)
            .unwrap_or_default();
        if max_retry_attempts == 0 {
            return Err(ConfigError::NotPositive("maxRetryAttempts"));
        }
        let backoff_unit_ms = pick(&self.backoff_unit_ms, &defaults.backoff_unit_ms);
        let report_interval_secs = pick(&self.report_interval_secs, &defaults.report_interval_secs);
        if report_interval_secs == 0 {
            return Err(ConfigError::NotPositive("reportIntervalSecs"));
        }
        let max_frame_bytes = self.max_frame_bytes.or(defaults.max_frame_bytes).unwrap_or_default();
        if max_frame_bytes == 0 {
            return Err(ConfigError::NotPositive("maxFrameBytes"));
        }

        let rate_limit_policy = if self.retry_rate_limited.unwrap_or(false) {
            RateLimitPolicy::Retry
        } else {
            RateLimitPolicy::Abort
        };

        let mut logging = LogSettings::new(
            APP_NAME,
            self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs")),
            self.log_level.clone().unwrap_or_else(|| "info".to_string()),
        );
        logging.json_file = self.log_json.unwrap_or(false);

        Ok(TrackerSettings {
            endpoint,
            session: SessionSettings {
                max_retry_attempts,
                backoff_unit: Duration::from_millis(backoff_unit_ms),
                rate_limit_policy,
                max_frame_bytes,
            },
            delivery: self.queue_mode.unwrap_or(QueueMode::Channel).into(),
            report_interval: Duration::from_secs(report_interval_secs),
            logging,
        })
    }
}

/// Layers defaults < config file < environment and CLI arguments.
pub fn resolve(cli: Config) -> Result<Config, ConfigError> {
    let mut current_config = Config::defaults();

    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_file_path.exists() {
        let config_str = fs::read_to_string(&config_file_path).map_err(|source| ConfigError::Read {
            path: config_file_path.clone(),
            source,
        })?;
        let file_config = serde_json::from_str::<Config>(&config_str).map_err(|source| ConfigError::Parse {
            path: config_file_path.clone(),
            source,
        })?;
        current_config = current_config.merge(file_config);
    } else if cli.config_path.is_some() {
        return Err(ConfigError::MissingFile(config_file_path));
    }

    current_config = current_config.merge(cli);

    if current_config.bearer_token.is_none() {
        current_config.bearer_token = env::var(LEGACY_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
    }

    Ok(current_config)
}

pub fn load_config() -> Result<Config, ConfigError> {
    // A missing .env file is normal in production.
    dotenvy::dotenv().ok();
    resolve(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Config {
        let mut argv = vec![APP_NAME];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracker.conf");
        fs::write(
            &path,
            r#"{"streamUrl":"http://127.0.0.1:9/stream","maxRetryAttempts":5,"queueMode":"inline","bearerToken":"file-token"}"#,
        )
        .unwrap();

        let config = resolve(cli(&[
            "--config-path",
            path.to_str().unwrap(),
            "--max-retry-attempts",
            "7",
            "--bearer-token",
            "cli-token",
        ]))
        .unwrap();

        assert_eq!(config.max_retry_attempts, Some(7));
        assert_eq!(config.stream_url.as_deref(), Some("http://127.0.0.1:9/stream"));
        assert_eq!(config.queue_mode, Some(QueueMode::Inline));
        assert_eq!(config.bearer_token.as_deref(), Some("cli-token"));
        assert_eq!(config.report_interval_secs, Some(60));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = resolve(cli(&["--config-path", "/definitely/not/here.conf"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        fs::write(&path, "{ not json").unwrap();
        let err = resolve(cli(&["--config-path", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn settings_from_defaults_and_token() {
        let config = Config::defaults().merge(cli(&["--bearer-token", "abc%3D%3D"]));
        let settings = config.tracker_settings().unwrap();

        assert_eq!(settings.endpoint.bearer_token(), "abc==");
        assert_eq!(settings.endpoint.url().as_str(), DEFAULT_STREAM_URL);
        assert_eq!(settings.endpoint.user_agent(), DEFAULT_USER_AGENT);
        assert_eq!(settings.session.max_retry_attempts, 15);
        assert_eq!(settings.session.backoff_unit, Duration::from_secs(1));
        assert_eq!(settings.session.rate_limit_policy, RateLimitPolicy::Abort);
        assert_eq!(settings.delivery, DeliveryMode::Channel);
        assert_eq!(settings.report_interval, Duration::from_secs(60));
        assert_eq!(settings.logging.app_name, APP_NAME);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn relaxed_rate_limit_and_inline_mode() {
        let config = Config::defaults().merge(cli(&[
            "--bearer-token",
            "t",
            "--retry-rate-limited",
            "true",
            "--queue-mode",
            "inline",
            "--backoff-unit-ms",
            "250",
        ]));
        let settings = config.tracker_settings().unwrap();
        assert_eq!(settings.session.rate_limit_policy, RateLimitPolicy::Retry);
        assert_eq!(settings.delivery, DeliveryMode::Inline);
        assert_eq!(settings.session.backoff_unit, Duration::from_millis(250));
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        let mut config = Config::defaults();
        assert!(matches!(config.tracker_settings(), Err(ConfigError::MissingToken)));
        config.bearer_token = Some("   ".to_string());
        assert!(matches!(config.tracker_settings(), Err(ConfigError::MissingToken)));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = Config::defaults();
        config.bearer_token = Some("t".to_string());
        config.max_retry_attempts = Some(0);
        assert!(matches!(config.tracker_settings(), Err(ConfigError::NotPositive(_))));

        config.max_retry_attempts = Some(3);
        config.report_interval_secs = Some(0);
        assert!(matches!(config.tracker_settings(), Err(ConfigError::NotPositive(_))));
    }

    #[test]
    fn invalid_url_surfaces_endpoint_error() {
        let mut config = Config::defaults();
        config.bearer_token = Some("t".to_string());
        config.stream_url = Some("not a url".to_string());
        assert!(matches!(config.tracker_settings(), Err(ConfigError::Endpoint(_))));
    }
}
