//! Configuration for the plugin host: server binding, process manager
//! limits, install job queue behavior, package index settings, and the
//! backing stores (Redis, object storage) carried for compatibility with a
//! future distributed deployment.
//!
//! Loaded from a TOML file plus `PLUGIN_HOST_*` environment overrides,
//! validated once at startup (`validate_schema`).
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [runtime]
//! max_subprocess = 20
//! extensions_path = "./extensions"
//! local_storage_path = "/tmp/"
//! worker_job_timeout = "180s"
//! start_process_max_retries = 10
//! start_process_retry_delay = "500ms"
//! blocking_pool_size = 20
//!
//! [package]
//! index_url = "https://pypi.org/simple"
//! ```

use crate::duration_serde;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP edge binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Process manager / install job queue / bootstrap retry settings:
/// `max_subprocess`, `extensions_path`, `local_storage_path`,
/// `worker_job_timeout`, `start_process_max_retries`,
/// `start_process_retry_delay`, plus a `blocking_pool_size` sizing the
/// executor used for blocking filesystem work off the async runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub max_subprocess: usize,
    pub extensions_path: PathBuf,
    pub local_storage_path: PathBuf,
    #[serde(with = "duration_serde")]
    pub worker_job_timeout: Duration,
    pub start_process_max_retries: u32,
    #[serde(with = "duration_serde")]
    pub start_process_retry_delay: Duration,
    pub blocking_pool_size: usize,
    pub install_workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_subprocess: 20,
            extensions_path: PathBuf::from("./extensions"),
            local_storage_path: PathBuf::from("/tmp/"),
            worker_job_timeout: Duration::from_secs(180),
            start_process_max_retries: 10,
            start_process_retry_delay: Duration::from_millis(500),
            blocking_pool_size: 20,
            install_workers: 4,
        }
    }
}

impl RuntimeConfig {
    pub fn package_path(&self, pkg: &str, version: &str) -> PathBuf {
        self.extensions_path.join(pkg).join(version)
    }
}

/// Index settings used for online dependency resolution.
///
/// `resolver_binary` names the external dependency resolver to shell out
/// to: this crate's plugins are statically linked, so a bundle's own code
/// is never executed from the unpacked directory — only
/// its declared *external* dependencies need resolving. An empty string
/// (the default) means "no resolver configured", and the installer skips
/// straight to unpacking the bundle; set it to a real resolver binary to
/// exercise the online/offline dependency install paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub index_url: String,
    #[serde(default)]
    pub extra_index_url: String,
    #[serde(default)]
    pub trusted_host: String,
    #[serde(default)]
    pub resolver_binary: String,
}

/// Redis connection settings, carried for a future distributed install job
/// queue backend; the default queue is in-process and does not read these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub cluster_type: RedisClusterType,
    pub host: String,
    #[serde(default)]
    pub master_name: String,
    #[serde(default)]
    pub password: String,
    pub db: u8,
    pub ssl: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            cluster_type: RedisClusterType::Single,
            host: "127.0.0.1:6379".to_string(),
            master_name: String::new(),
            password: String::new(),
            db: 0,
            ssl: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedisClusterType {
    Single,
    Cluster,
    Sentinel,
}

/// Object storage settings for downloaded bundle files. `LocalPath` is the
/// only backend this crate implements; `S3` is accepted by config parsing
/// for forward compatibility but rejected by `validate_schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    LocalPath { path: PathBuf },
    S3 { bucket: String, endpoint: Option<String> },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::LocalPath { path: PathBuf::from("/tmp/pkg") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            runtime: RuntimeConfig::default(),
            package: PackageConfig::default(),
            redis: RedisConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate_schema()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("PLUGIN_HOST_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port_str) = env::var("PLUGIN_HOST_PORT") {
            self.server.port = port_str
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid PLUGIN_HOST_PORT: {}", port_str))?;
        }
        if let Ok(path) = env::var("PLUGIN_HOST_EXTENSIONS_PATH") {
            self.runtime.extensions_path = PathBuf::from(path);
        }
        if let Ok(max) = env::var("PLUGIN_HOST_MAX_SUBPROCESS") {
            self.runtime.max_subprocess = max
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid PLUGIN_HOST_MAX_SUBPROCESS: {}", max))?;
        }
        if let Ok(level) = env::var("PLUGIN_HOST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(url) = env::var("PLUGIN_HOST_REDIS_URL") {
            self.redis.host = url;
        }
        Ok(())
    }

    pub fn validate_schema(&self) -> anyhow::Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server port must be between 1 and 65535"));
        }
        if self.runtime.max_subprocess == 0 {
            return Err(anyhow::anyhow!("runtime.max_subprocess must be at least 1"));
        }
        if self.runtime.worker_job_timeout.as_secs() == 0 {
            return Err(anyhow::anyhow!("runtime.worker_job_timeout cannot be 0"));
        }
        if self.runtime.start_process_max_retries == 0 {
            return Err(anyhow::anyhow!(
                "runtime.start_process_max_retries must be at least 1"
            ));
        }
        if let Some(index_url) = Some(&self.package.index_url).filter(|u| !u.is_empty()) {
            if !index_url.starts_with("http://") && !index_url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "package.index_url must start with http:// or https://"
                ));
            }
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "invalid log level: {}. must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }
        if let StorageConfig::S3 { .. } = &self.storage {
            return Err(anyhow::anyhow!(
                "storage backend 's3' is accepted by config parsing but not yet implemented"
            ));
        }
        Ok(())
    }
}
