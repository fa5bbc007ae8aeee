//! Package installer: resolves a bundle URI to a local file, reads its
//! declarations, and unpacks it into the versioned extensions directory.
//!
//! Per-package-name installs and deletes are serialized through `locks`,
//! making explicit with one mutex per package name what a single-worker
//! job runner would otherwise get for free by never racing two installs
//! of the same name.

use crate::bundle::{Bundle, PLUGIN_ENTRY_GROUP};
use crate::config::{PackageConfig, RuntimeConfig};
use crate::error::PluginHostError;
use crate::model::{PackageBrief, PackageBriefWithEntry};
use dashmap::DashMap;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct Installer {
    runtime: RuntimeConfig,
    package: PackageConfig,
    http: reqwest::Client,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Installer {
    pub fn new(runtime: RuntimeConfig, package: PackageConfig) -> Self {
        Installer {
            runtime,
            package,
            http: reqwest::Client::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve a bundle URI to a local path, downloading and caching
    /// `http(s)://` bundles under `local_storage_path`. `file://` bundles are
    /// read in place.
    async fn resolve_bundle_path(&self, uri: &str, filename: &str) -> Result<PathBuf, PluginHostError> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return self.download(uri, filename).await;
        }
        Err(PluginHostError::InvalidPackage(format!(
            "unsupported bundle uri scheme: {uri}"
        )))
    }

    async fn download(&self, uri: &str, filename: &str) -> Result<PathBuf, PluginHostError> {
        let dest = self.runtime.local_storage_path.join("pkg").join(filename);
        if dest.exists() {
            return Ok(dest);
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result: Result<(), PluginHostError> = async {
            let resp = self
                .http
                .get(uri)
                .send()
                .await
                .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?
                .error_for_status()
                .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?;

            let mut file = tokio::fs::File::create(&dest).await?;
            let mut body = resp.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| PluginHostError::InstallFailed(e.to_string()))?;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }
        Ok(dest)
    }

    /// Install a bundle, returning its brief record. Re-installing an
    /// already-installed `(name, version)` fails with `AlreadyInstalled`
    /// unless `force` is set.
    pub async fn install(&self, uri: &str, filename: &str, force: bool) -> Result<PackageBrief, PluginHostError> {
        let bundle_path = self.resolve_bundle_path(uri, filename).await?;

        let info = {
            let bundle_path = bundle_path.clone();
            tokio::task::spawn_blocking(move || Bundle::open(&bundle_path)?.package_info())
                .await
                .map_err(|e| PluginHostError::Internal { message: e.to_string() })?
                .map_err(|e| PluginHostError::InvalidPackage(e.to_string()))?
        };

        let lock = self.lock_for(&info.name);
        let _guard = lock.lock().await;

        let target = self.runtime.package_path(&info.name, &info.version);
        if target.exists() && !force {
            return Err(PluginHostError::AlreadyInstalled(format!("{} {}", info.name, info.version)));
        }

        let scratch = tempfile::tempdir()?;
        let scratch_path = scratch.path().to_path_buf();
        let has_dependencies = {
            let bundle_path = bundle_path.clone();
            let scratch_path = scratch_path.clone();
            tokio::task::spawn_blocking(move || Bundle::open(&bundle_path)?.extract_dependencies(&scratch_path))
                .await
                .map_err(|e| PluginHostError::Internal { message: e.to_string() })?
                .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?
        };

        if has_dependencies {
            self.resolve_offline(&bundle_path, &scratch_path.join("dependencies"), &target).await?;
        } else {
            self.resolve_online(&bundle_path, &target).await?;
        }

        {
            let bundle_path = bundle_path.clone();
            let target = target.clone();
            tokio::task::spawn_blocking(move || Bundle::open(&bundle_path)?.extract_all(&target))
                .await
                .map_err(|e| PluginHostError::Internal { message: e.to_string() })?
                .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?;
        }

        Ok(PackageBrief {
            name: info.name,
            version: info.version,
            uri: uri.to_string(),
            filename: filename.to_string(),
        })
    }

    /// Read a bundle's package identity and declared plugin names without
    /// installing anything.
    pub async fn read_metadata(&self, uri: &str, filename: &str) -> Result<PackageBriefWithEntry, PluginHostError> {
        let bundle_path = self.resolve_bundle_path(uri, filename).await?;

        let (info, entry_points, metadata) = tokio::task::spawn_blocking(move || {
            let mut bundle = Bundle::open(&bundle_path)?;
            let info = bundle.package_info()?;
            let entry_points = bundle.entry_points()?;
            let metadata = bundle.metadata()?;
            Ok::<_, anyhow::Error>((info, entry_points, metadata))
        })
        .await
        .map_err(|e| PluginHostError::Internal { message: e.to_string() })?
        .map_err(|e| PluginHostError::InvalidPackage(e.to_string()))?;

        let plugins = match metadata {
            Some(meta) => vec![meta.name],
            None => {
                let mut names = entry_points.names_in_group(PLUGIN_ENTRY_GROUP);
                names.sort_unstable();
                names
            }
        };

        Ok(PackageBriefWithEntry {
            name: info.name,
            version: info.version,
            uri: uri.to_string(),
            filename: filename.to_string(),
            plugins,
        })
    }

    /// Remove an installed package's directory, pruning the now-empty
    /// parent directory the way `delete_pkg` does.
    pub async fn delete(&self, pkg: &str, version: &str) -> Result<(), PluginHostError> {
        let lock = self.lock_for(pkg);
        let _guard = lock.lock().await;

        let target = self.runtime.package_path(pkg, version);
        if !target.exists() {
            return Ok(());
        }
        tokio::fs::remove_dir_all(&target).await?;

        if let Some(parent) = target.parent() {
            if let Ok(mut entries) = tokio::fs::read_dir(parent).await {
                if entries.next_entry().await?.is_none() {
                    let _ = tokio::fs::remove_dir(parent).await;
                }
            }
        }
        Ok(())
    }

    /// Resolve declared dependencies from the bundle's embedded
    /// `dependencies/` vendor tree, with no network access. A no-op when no
    /// resolver binary is configured (the default — see `PackageConfig`).
    async fn resolve_offline(&self, bundle_path: &Path, find_links: &Path, target: &Path) -> Result<(), PluginHostError> {
        if self.package.resolver_binary.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(target).await?;
        let output = tokio::process::Command::new(&self.package.resolver_binary)
            .arg("install")
            .arg(bundle_path)
            .arg("-t")
            .arg(target)
            .arg("--no-index")
            .arg("--find-links")
            .arg(find_links)
            .output()
            .await
            .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(PluginHostError::InstallFailed(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(())
    }

    /// Resolve declared dependencies against the configured package index.
    async fn resolve_online(&self, bundle_path: &Path, target: &Path) -> Result<(), PluginHostError> {
        if self.package.resolver_binary.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(target).await?;
        let mut cmd = tokio::process::Command::new(&self.package.resolver_binary);
        cmd.arg("install").arg(bundle_path).arg("-t").arg(target).arg("-U");
        if !self.package.index_url.is_empty() {
            cmd.arg("--index-url").arg(&self.package.index_url);
        }
        if !self.package.extra_index_url.is_empty() {
            cmd.arg("--extra-index-url").arg(&self.package.extra_index_url);
        }
        if !self.package.trusted_host.is_empty() {
            cmd.arg("--trusted-host").arg(&self.package.trusted_host);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| PluginHostError::InstallFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(PluginHostError::InstallFailed(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(())
    }
}
