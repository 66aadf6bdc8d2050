use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use config::ConfigError;

/// Origins allowed to submit forms when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://sandipnanavati.com",
    "https://www.sandipnanavati.com",
    "http://127.0.0.1:5500",
    "http://localhost:5500",
];

/// Load a deserializable struct from process environment variables.
///
/// Variable names map onto snake_case field names, so `SMTP_HOST` fills
/// `smtp_host`. Values are coerced from strings by the `config` crate.
pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

/// What happens to a staged attachment once the relay attempt is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Delete only after a successful send; a failed send leaves the file behind.
    #[default]
    OnSuccess,
    /// Delete after every send attempt.
    Always,
}

impl CleanupPolicy {
    pub fn discard_after(self, sent: bool) -> bool {
        match self {
            CleanupPolicy::OnSuccess => sent,
            CleanupPolicy::Always => true,
        }
    }
}

/// HTTP-facing settings. Relay settings live in [`crate::mail::MailerConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Destination mailbox; falls back to `SMTP_USER` when unset.
    pub receiver_email: Option<String>,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub upload_cleanup: CleanupPolicy,

    /// Comma-separated origin list replacing [`DEFAULT_ALLOWED_ORIGINS`].
    pub allowed_origins: Option<String>,
}

fn default_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            receiver_email: None,
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_cleanup: CleanupPolicy::default(),
            allowed_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn origins(&self) -> Vec<String> {
        match self.allowed_origins.as_deref() {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            _ => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}
