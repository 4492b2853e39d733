use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub rest: RestConfig,
}

/// Local API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8090))
}

/// Content sync configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Management server base URL; syncs fail with a configuration error while unset
    pub core_api_base: Option<String>,
    #[serde(default = "default_device_key_header")]
    pub device_key_header: String,
    /// Device key (loaded from environment, not from config file)
    #[serde(skip)]
    pub device_key: Option<String>,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Holds `status.json` and `schedule.json`
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_max_parallel_downloads")]
    pub max_parallel_downloads: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bounds the manifest request; downloads are bounded by cancellation only
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Scheduler wake-up interval while the schedule is empty
    #[serde(default = "default_idle_poll_secs")]
    pub idle_poll_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl SyncConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_secs)
    }

    pub fn status_file(&self) -> PathBuf {
        self.state_dir.join("status.json")
    }

    pub fn schedule_file(&self) -> PathBuf {
        self.state_dir.join("schedule.json")
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            core_api_base: None,
            device_key_header: default_device_key_header(),
            device_key: None,
            media_dir: default_media_dir(),
            state_dir: default_state_dir(),
            max_parallel_downloads: default_max_parallel_downloads(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_poll_secs: default_idle_poll_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_device_key_header() -> String {
    "X-Device-Key".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("data/state")
}

fn default_max_parallel_downloads() -> usize {
    4
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_idle_poll_secs() -> u64 {
    3600
}

fn default_user_agent() -> String {
    concat!("mediasync/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Maintenance window configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestConfig {
    /// Account whose crontab holds the windows; empty means the current user
    #[serde(default = "default_crontab_user")]
    pub crontab_user: String,
    #[serde(default = "default_service_unit")]
    pub service_unit: String,
    /// `{unit}` is replaced with `service_unit`
    #[serde(default = "default_stop_command")]
    pub stop_command: String,
    #[serde(default = "default_start_command")]
    pub start_command: String,
}

impl RestConfig {
    pub fn stop_command(&self) -> String {
        self.stop_command.replace("{unit}", &self.service_unit)
    }

    pub fn start_command(&self) -> String {
        self.start_command.replace("{unit}", &self.service_unit)
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            crontab_user: default_crontab_user(),
            service_unit: default_service_unit(),
            stop_command: default_stop_command(),
            start_command: default_start_command(),
        }
    }
}

fn default_crontab_user() -> String {
    "player".to_string()
}

fn default_service_unit() -> String {
    "player.service".to_string()
}

fn default_stop_command() -> String {
    "systemctl stop {unit}".to_string()
}

fn default_start_command() -> String {
    "systemctl start {unit}".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8090");
        assert!(config.sync.core_api_base.is_none());
        assert_eq!(config.sync.max_parallel_downloads, 4);
        assert_eq!(config.sync.idle_poll(), Duration::from_secs(3600));
        assert_eq!(config.sync.status_file(), PathBuf::from("data/state/status.json"));
        assert_eq!(config.rest.crontab_user, "player");
    }

    #[test]
    fn test_command_templates_expand_unit() {
        let rest = RestConfig {
            service_unit: "signage.service".to_string(),
            ..RestConfig::default()
        };
        assert_eq!(rest.stop_command(), "systemctl stop signage.service");
        assert_eq!(rest.start_command(), "systemctl start signage.service");
    }
}
