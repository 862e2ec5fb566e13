use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "cohort.toml",
    "config/cohort.toml",
    "crates/config/cohort.toml",
    "../cohort.toml",
    "../config/cohort.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub community: CommunityConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cohort.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Server-side tuning of the real-time community channel.
///
/// ```
/// use cohort_config::CommunityConfig;
///
/// let community = CommunityConfig::default();
/// assert_eq!(community.typing_timeout().as_secs(), 3);
/// assert_eq!(community.default_page_size, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Lifetime of a typing entry after its last refresh
    pub typing_timeout_ms: u64,
    /// Per-channel fan-out buffer; slower receivers lose the oldest frames
    pub broadcast_capacity: usize,
    pub default_page_size: i64,
    pub max_page_size: i64,
    /// Measured in characters, not bytes
    pub max_message_length: usize,
    /// Per-connection outbound frame queue
    pub outbound_queue: usize,
}

impl CommunityConfig {
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            typing_timeout_ms: 3_000,
            broadcast_capacity: 256,
            default_page_size: 50,
            max_page_size: 200,
            max_message_length: 4_000,
            outbound_queue: 128,
        }
    }
}

/// Reconnection policy of a client connection session.
///
/// ```
/// use cohort_config::ClientConfig;
///
/// let client = ClientConfig::default();
/// assert_eq!(client.max_reconnect_attempts, 5);
/// assert_eq!(client.backoff_base().as_secs(), 1);
/// assert_eq!(client.backoff_max().as_secs(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub max_reconnect_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub history_page_size: i64,
    /// Messages retained per joined channel for duplicate filtering
    pub timeline_capacity: usize,
}

impl ClientConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            backoff_base_ms: 1_000,
            backoff_max_ms: 5_000,
            history_page_size: 50,
            timeline_capacity: 500,
        }
    }
}

impl AppConfig {
    /// Reject combinations that would break paging or reconnection invariants
    pub fn validate(&self) -> anyhow::Result<()> {
        let community = &self.community;
        if community.default_page_size < 1 || community.max_page_size < community.default_page_size {
            bail!(
                "community.max_page_size ({}) must be >= default_page_size ({}) >= 1",
                community.max_page_size,
                community.default_page_size
            );
        }
        if community.broadcast_capacity == 0 || community.outbound_queue == 0 {
            bail!("community.broadcast_capacity and community.outbound_queue must be non-zero");
        }
        if community.typing_timeout_ms == 0 {
            bail!("community.typing_timeout_ms must be non-zero");
        }
        if self.client.max_reconnect_attempts == 0 {
            bail!("client.max_reconnect_attempts must be at least 1");
        }
        if self.client.backoff_max_ms < self.client.backoff_base_ms {
            bail!("client.backoff_max_ms must be >= client.backoff_base_ms");
        }
        if self.client.timeline_capacity < self.client.history_page_size.max(1) as usize {
            bail!("client.timeline_capacity must hold at least one history page");
        }
        Ok(())
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use cohort_config::load;
///
/// std::env::remove_var("COHORT_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder();
    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("COHORT_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via COHORT_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix("COHORT").separator("__"));

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.validate().context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
