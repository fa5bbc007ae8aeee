//! LRU process manager: one child worker process per `(package, version)`
//! key, capped at `max_subprocess`, evicting the least-recently-used child
//! on overflow.
//!
//! The whole ordered map lives behind one real `tokio::sync::Mutex`.
//! `lru::LruCache` gives us the ordered map and the overflow eviction in
//! one data structure.

use crate::config::RuntimeConfig;
use lru::LruCache;
use plugin_runtime_sdk::client::BootstrapRetry;
use plugin_runtime_sdk::error::PluginError;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// A running (or recently running) child worker.
pub struct ChildHandle {
    pub pkg: String,
    pub version: String,
    pub addr: PathBuf,
    child: Child,
}

impl ChildHandle {
    /// Whether the OS process backing this child is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send SIGTERM and let the child's own signal handler drain and
    /// unlink its socket, mirroring `ProcessWorker.__del__`'s
    /// `self.p.terminate()`.
    fn terminate(&self) {
        if let Some(pid) = self.pid() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn key_fn(pkg: &str, version: &str) -> String {
    format!("{pkg}-{version}")
}

fn socket_addr(local_storage_path: &std::path::Path, pkg: &str, version: &str) -> PathBuf {
    local_storage_path.join("run").join(format!("plugin-host.{pkg}.{version}.sock"))
}

pub struct ProcessManager {
    processes: Mutex<LruCache<String, ChildHandle>>,
    runtime: RuntimeConfig,
    child_binary: PathBuf,
}

impl ProcessManager {
    pub fn new(runtime: RuntimeConfig, child_binary: PathBuf) -> Self {
        let cap = NonZeroUsize::new(runtime.max_subprocess.max(1)).unwrap();
        ProcessManager {
            processes: Mutex::new(LruCache::new(cap)),
            runtime,
            child_binary,
        }
    }

    pub fn bootstrap_retry(&self) -> BootstrapRetry {
        BootstrapRetry {
            max_retries: self.runtime.start_process_max_retries,
            retry_delay: self.runtime.start_process_retry_delay,
        }
    }

    /// Ensure a live child exists for `(pkg, version)`, spawning one if
    /// needed. Returns its socket address and whether it was freshly
    /// started. Moves an existing, running child to the most-recently-used
    /// position.
    pub async fn ensure(&self, pkg: &str, version: &str) -> Result<(PathBuf, bool), PluginError> {
        let key = key_fn(pkg, version);
        let mut processes = self.processes.lock().await;

        if let Some(handle) = processes.get_mut(&key) {
            if handle.is_running() {
                return Ok((handle.addr.clone(), false));
            }
            processes.pop(&key);
        }

        let package_path = self.runtime.package_path(pkg, version);
        if !package_path.exists() {
            return Err(PluginError::new(
                "PackageNotFound",
                format!("package {pkg} version {version} not found"),
                404,
            ));
        }

        let addr = socket_addr(&self.runtime.local_storage_path, pkg, version);
        if let Some(parent) = addr.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(PluginError::from)?;
        }
        let _ = tokio::fs::remove_file(&addr).await;

        let child = Command::new(&self.child_binary)
            .arg("--pkg").arg(pkg)
            .arg("--version").arg(version)
            .arg("--addr").arg(&addr)
            .arg("--package-path").arg(&package_path)
            .arg("--blocking-pool-size").arg(self.runtime.blocking_pool_size.to_string())
            .kill_on_drop(false)
            .spawn()
            .map_err(PluginError::from)?;

        tracing::info!(pkg, version, addr = %addr.display(), "started child process");

        let handle = ChildHandle { pkg: pkg.to_string(), version: version.to_string(), addr: addr.clone(), child };
        if let Some((evicted_key, evicted)) = processes.push(key, handle) {
            tracing::info!(evicted_key, "process limit reached, evicting least-recently-used child");
            drop(evicted);
        }

        Ok((addr, true))
    }

    /// Stop and drop the child for `(pkg, version)`, if any.
    pub async fn stop(&self, pkg: &str, version: &str) {
        let key = key_fn(pkg, version);
        let mut processes = self.processes.lock().await;
        processes.pop(&key);
    }

    /// Snapshot of currently tracked keys, most-recently-used first.
    pub async fn live_keys(&self) -> Vec<String> {
        let processes = self.processes.lock().await;
        processes.iter().map(|(k, _)| k.clone()).collect()
    }
}

pub type SharedProcessManager = Arc<ProcessManager>;
