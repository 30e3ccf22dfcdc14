//! Configuration types.
//!
//! Everything is read from `REPLY_RELAY_*` environment variables once at
//! startup and shared read-only afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Package name of the app whose notifications are intercepted by default.
pub const DEFAULT_SOURCE_APP: &str = "com.instagram.android";

/// Default base URL of the response service.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";

/// Default connect/read/write ceiling for the response service client.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// What to do when the service answers with an empty reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyReplyPolicy {
    /// Inject the empty string like any other reply.
    #[default]
    Inject,
    /// Treat an empty reply as "nothing to say".
    Suppress,
}

impl FromStr for EmptyReplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inject" => Ok(Self::Inject),
            "suppress" => Ok(Self::Suppress),
            other => Err(format!("expected 'inject' or 'suppress', got '{other}'")),
        }
    }
}

/// Feedback guard settings. Present only when the guard is enabled.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Minimum time between two replies to the same sender.
    pub cooldown: Duration,
    /// How many processed `sender:message` pairs to remember.
    pub max_processed: usize,
    /// How many of our own replies to remember.
    pub max_sent_replies: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            max_processed: 100,
            max_sent_replies: 50,
        }
    }
}

/// Interception pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Only notifications from this application are handled.
    pub source_app: String,
    /// Safety switch. When off, replies are logged but never injected.
    pub auto_reply_enabled: bool,
    pub empty_reply: EmptyReplyPolicy,
    /// Drop notifications that summarize a group of other notifications.
    pub skip_group_summaries: bool,
    /// Dismiss the notification after a reply was delivered.
    pub dismiss_after_reply: bool,
    /// Feedback guard; `None` disables it.
    pub guard: Option<GuardConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_app: DEFAULT_SOURCE_APP.to_string(),
            auto_reply_enabled: true,
            empty_reply: EmptyReplyPolicy::Inject,
            skip_group_summaries: true,
            dismiss_after_reply: false,
            guard: None,
        }
    }
}

impl PipelineConfig {
    /// Pipeline configuration for the given source app with default settings.
    pub fn for_source(source_app: impl Into<String>) -> Self {
        Self {
            source_app: source_app.into(),
            ..Self::default()
        }
    }
}

/// Response service client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL; `/chat` is appended.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Outer backstop for a whole exchange. The connect and read ceilings
    /// are enforced on their own as well.
    pub fn request_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout + self.write_timeout
    }
}

/// Which notification source feeds the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Newline-delimited JSON on stdin.
    Stdin,
    /// HTTP webhook on the given port.
    Webhook { port: u16 },
}

/// Everything the binary needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub client: ClientConfig,
    pub source: SourceKind,
    /// Directory for daily-rolling log files, if any.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let guard = if parse_or(&get, "REPLY_RELAY_GUARD", false)? {
            Some(GuardConfig {
                cooldown: Duration::from_secs(parse_or(&get, "REPLY_RELAY_COOLDOWN_SECS", 10)?),
                ..GuardConfig::default()
            })
        } else {
            None
        };

        let pipeline = PipelineConfig {
            source_app: get("REPLY_RELAY_SOURCE_APP")
                .unwrap_or_else(|| DEFAULT_SOURCE_APP.to_string()),
            auto_reply_enabled: parse_or(&get, "REPLY_RELAY_AUTO_REPLY", true)?,
            empty_reply: parse_or(&get, "REPLY_RELAY_EMPTY_REPLY", EmptyReplyPolicy::Inject)?,
            skip_group_summaries: parse_or(&get, "REPLY_RELAY_SKIP_GROUP_SUMMARIES", true)?,
            dismiss_after_reply: parse_or(&get, "REPLY_RELAY_DISMISS_AFTER_REPLY", false)?,
            guard,
        };

        let client = ClientConfig {
            base_url: get("REPLY_RELAY_BACKEND_URL")
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            connect_timeout: Duration::from_secs(parse_or(
                &get,
                "REPLY_RELAY_CONNECT_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            read_timeout: Duration::from_secs(parse_or(
                &get,
                "REPLY_RELAY_READ_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            write_timeout: Duration::from_secs(parse_or(
                &get,
                "REPLY_RELAY_WRITE_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        };

        let source = match get("REPLY_RELAY_SOURCE").as_deref().map(str::trim) {
            None | Some("stdin") => SourceKind::Stdin,
            Some("webhook") => SourceKind::Webhook {
                port: parse_or(&get, "REPLY_RELAY_WEBHOOK_PORT", 8090)?,
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "REPLY_RELAY_SOURCE".into(),
                    message: format!("expected 'stdin' or 'webhook', got '{other}'"),
                });
            }
        };

        Ok(Self {
            pipeline,
            client,
            source,
            log_dir: get("REPLY_RELAY_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
