use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub store_type: StorageType,
    // comma separated, more than one url means a redis cluster
    #[serde(default = "default_redis_urls")]
    pub redis_urls: String,
}

fn default_redis_urls() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_type: StorageType::default(),
            redis_urls: default_redis_urls(),
        }
    }
}

/// Directory layout of a node. Unset directories derive from `root_dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    pub apps_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub env_dir: Option<PathBuf>,
    pub supervisor_conf_dir: Option<PathBuf>,
    pub proxy_conf_dir: Option<PathBuf>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/var/tmp")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::rooted(default_root_dir())
    }
}

impl PathsConfig {
    pub fn rooted(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            apps_dir: None,
            log_dir: None,
            state_dir: None,
            env_dir: None,
            supervisor_conf_dir: None,
            proxy_conf_dir: None,
        }
    }

    fn dir(&self, explicit: &Option<PathBuf>, name: &str) -> PathBuf {
        explicit.clone().unwrap_or_else(|| self.root_dir.join(name))
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.dir(&self.apps_dir, "apps")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir(&self.log_dir, "logs")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir(&self.state_dir, "state")
    }

    pub fn env_dir(&self) -> PathBuf {
        self.dir(&self.env_dir, "ve")
    }

    pub fn supervisor_conf_dir(&self) -> PathBuf {
        self.dir(&self.supervisor_conf_dir, "supervisor")
    }

    pub fn proxy_conf_dir(&self) -> PathBuf {
        self.dir(&self.proxy_conf_dir, "nginx")
    }

    /// Lives beside the include dir so `*.conf` never matches it.
    pub fn supervisord_conf(&self) -> PathBuf {
        self.root_dir.join("supervisord.conf")
    }

    pub fn app_dir(&self, app: &str) -> PathBuf {
        self.apps_dir().join(app)
    }

    pub fn app_state_dir(&self, app: &str) -> PathBuf {
        self.state_dir().join(app)
    }

    pub fn app_env_dir(&self, app: &str) -> PathBuf {
        self.env_dir().join(app)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortsConfig {
    #[serde(default = "default_min_port")]
    pub min_port: u16,
    #[serde(default = "default_max_port")]
    pub max_port: u16,
}

const fn default_min_port() -> u16 {
    15000
}

const fn default_max_port() -> u16 {
    40000
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            min_port: default_min_port(),
            max_port: default_max_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    #[serde(default = "default_pop_timeout_secs")]
    pub pop_timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

const fn default_result_ttl_secs() -> u64 {
    86400
}

const fn default_pop_timeout_secs() -> u64 {
    5
}

const fn default_workers() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            result_ttl_secs: default_result_ttl_secs(),
            pop_timeout_secs: default_pop_timeout_secs(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_client_channel")]
    pub client_channel: String,
    #[serde(default = "default_master_channel")]
    pub master_channel: String,
}

const fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_client_channel() -> String {
    "client".to_string()
}

fn default_master_channel() -> String {
    "master".to_string()
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval_secs(),
            client_channel: default_client_channel(),
            master_channel: default_master_channel(),
        }
    }
}

/// External binaries and the fixed flags handed to the application server.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_app_user")]
    pub user: String,
    #[serde(default = "default_app_user")]
    pub group: String,
    #[serde(default = "default_virtualenv_bin")]
    pub virtualenv_bin: String,
    #[serde(default = "default_uwsgi_bin")]
    pub uwsgi_bin: String,
    #[serde(default = "default_nginx_bin")]
    pub nginx_bin: String,
    #[serde(default = "default_supervisorctl_bin")]
    pub supervisorctl_bin: String,
    #[serde(default = "default_git_bin")]
    pub git_bin: String,
    #[serde(default = "default_hg_bin")]
    pub hg_bin: String,
    #[serde(default = "default_chown_bin")]
    pub chown_bin: String,
    #[serde(default = "default_pkill_bin")]
    pub pkill_bin: String,
    #[serde(default = "default_which_bin")]
    pub which_bin: String,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_harakiri_secs")]
    pub harakiri_secs: u32,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_app_user() -> String {
    "www-data".to_string()
}

fn default_virtualenv_bin() -> String {
    "virtualenv".to_string()
}

fn default_uwsgi_bin() -> String {
    "uwsgi".to_string()
}

fn default_nginx_bin() -> String {
    "nginx".to_string()
}

fn default_supervisorctl_bin() -> String {
    "supervisorctl".to_string()
}

fn default_git_bin() -> String {
    "git".to_string()
}

fn default_hg_bin() -> String {
    "hg".to_string()
}

fn default_chown_bin() -> String {
    "chown".to_string()
}

fn default_pkill_bin() -> String {
    "pkill".to_string()
}

fn default_which_bin() -> String {
    "which".to_string()
}

const fn default_max_requests() -> u32 {
    5000
}

const fn default_harakiri_secs() -> u32 {
    30
}

const fn default_command_timeout_secs() -> u64 {
    600
}

const fn default_lock_ttl_secs() -> u64 {
    900
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            user: default_app_user(),
            group: default_app_user(),
            virtualenv_bin: default_virtualenv_bin(),
            uwsgi_bin: default_uwsgi_bin(),
            nginx_bin: default_nginx_bin(),
            supervisorctl_bin: default_supervisorctl_bin(),
            git_bin: default_git_bin(),
            hg_bin: default_hg_bin(),
            chown_bin: default_chown_bin(),
            pkill_bin: default_pkill_bin(),
            which_bin: default_which_bin(),
            max_requests: default_max_requests(),
            harakiri_secs: default_harakiri_secs(),
            extra_args: Vec::new(),
            command_timeout_secs: default_command_timeout_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl RuntimeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Immutable settings of one node agent, handed to every component.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_node_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    5000
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            address: default_address(),
            port: default_port(),
            version: default_version(),
            storage: StorageConfig::default(),
            paths: PathsConfig::default(),
            ports: PortsConfig::default(),
            queue: QueueConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Loads the agent config: `.env`, then the optional file at `path`, then
/// `TERMINUS_*` environment variables (`__` separates nested keys).
pub fn load_agent_config(path: &str) -> Result<AgentConfig> {
    dotenv::dotenv().ok();
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("TERMINUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let agent_config: AgentConfig = settings.try_deserialize()?;
    if agent_config.ports.min_port > agent_config.ports.max_port {
        return Err(anyhow::anyhow!(
            "invalid port range {}-{}",
            agent_config.ports.min_port,
            agent_config.ports.max_port
        ));
    }
    Ok(agent_config)
}
