use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// HS256 secret shared with the catalog that mints stream tokens
    /// (generate with `reelstream generate-secret`)
    #[serde(default)]
    pub token_secret: String,

    /// Upper bound on the upstream chunk size in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size_cap")]
    pub chunk_size_cap: u64,

    /// Bound on every upstream metadata or chunk call (default: 30)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Idle time after which a cached connection handle is evicted (default: 3600)
    #[serde(default = "default_handle_ttl")]
    pub handle_ttl_secs: u64,

    /// Period of the handle cache sweep (default: 900)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Refuse to stream bundles that have no stored identity hash
    #[serde(default)]
    pub require_identity_hash: bool,
}

fn default_chunk_size_cap() -> u64 {
    1024 * 1024
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_handle_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    900
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            chunk_size_cap: default_chunk_size_cap(),
            upstream_timeout_secs: default_upstream_timeout(),
            handle_ttl_secs: default_handle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            require_identity_hash: false,
        }
    }
}

impl StreamConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn handle_ttl(&self) -> Duration {
        Duration::from_secs(self.handle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite catalog path; `~` is expanded
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelstream.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// Database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// One upstream connection identity (a bot or client session of the
/// chunk-source bridge).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub name: String,

    pub base_url: String,

    /// Sent as `Authorization: Bearer ...` when set
    #[serde(default)]
    pub api_token: Option<String>,
}
