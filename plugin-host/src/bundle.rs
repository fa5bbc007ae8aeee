//! Bundle format: a zip archive shipping one or more plugins plus
//! declarations the installer reads without ever executing the archive's
//! contents directly (this crate statically links plugin implementations —
//! see `registry.rs` — so "installing" a bundle only ever copies files and
//! records entry points, it never imports arbitrary code).
//!
//! Three well-known members, located by shortest-path-first when a name
//! occurs more than once in the archive ("sorted by path length, take the
//! shortest" rule):
//!
//! - `package_info.toml` — `{ name, version }`, the bundle's own identity.
//! - `entry_points.toml` — `{ [group] \n name = "import.target" }`, which
//!   plugin names this bundle provides.
//! - `metadata.yaml` (optional) — a full [`plugin_runtime_sdk::Metadata`]
//!   document, when the bundle wants to skip child-side metadata discovery.
//!
//! Any entry whose path starts with `dependencies/` marks the bundle as
//! carrying an offline vendor tree for its dependencies.

use plugin_runtime_sdk::metadata::Metadata;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub const PLUGIN_ENTRY_GROUP: &str = "plugin_host.plugins";

#[derive(Debug, Clone, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EntryPoints {
    #[serde(flatten)]
    pub groups: HashMap<String, HashMap<String, String>>,
}

impl EntryPoints {
    pub fn names_in_group(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

pub struct Bundle {
    archive: zip::ZipArchive<std::fs::File>,
}

impl Bundle {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let archive = zip::ZipArchive::new(file)?;
        Ok(Bundle { archive })
    }

    fn shortest_matching(&mut self, needle: &str) -> anyhow::Result<Option<String>> {
        let mut candidates: Vec<String> = (0..self.archive.len())
            .filter_map(|i| self.archive.by_index(i).ok().map(|f| f.name().to_string()))
            .filter(|name| name.contains(needle))
            .collect();
        candidates.sort_by_key(|n| n.split('/').count());
        Ok(candidates.into_iter().next())
    }

    fn read_entry(&mut self, name: &str) -> anyhow::Result<Vec<u8>> {
        let mut entry = self.archive.by_name(name)?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn package_info(&mut self) -> anyhow::Result<PackageInfo> {
        let name = self
            .shortest_matching("package_info.toml")?
            .ok_or_else(|| anyhow::anyhow!("bundle has no package_info.toml"))?;
        let raw = self.read_entry(&name)?;
        Ok(toml::from_str(&String::from_utf8(raw)?)?)
    }

    pub fn entry_points(&mut self) -> anyhow::Result<EntryPoints> {
        match self.shortest_matching("entry_points.toml")? {
            Some(name) => {
                let raw = self.read_entry(&name)?;
                Ok(toml::from_str(&String::from_utf8(raw)?)?)
            }
            None => Ok(EntryPoints::default()),
        }
    }

    pub fn metadata(&mut self) -> anyhow::Result<Option<Metadata>> {
        match self.shortest_matching("metadata.yaml")? {
            Some(name) => {
                let raw = self.read_entry(&name)?;
                Ok(Some(serde_yaml::from_slice(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// True if the bundle carries a `dependencies/` prefixed vendor tree,
    /// after extracting it into `target_dir` for offline resolution.
    pub fn extract_dependencies(&mut self, target_dir: &Path) -> anyhow::Result<bool> {
        let mut has_dependencies = false;
        let names: Vec<String> = (0..self.archive.len())
            .filter_map(|i| self.archive.by_index(i).ok().map(|f| f.name().to_string()))
            .filter(|n| n.starts_with("dependencies/"))
            .collect();
        for name in names {
            has_dependencies = true;
            let mut entry = self.archive.by_name(&name)?;
            let dest = target_dir.join(&name);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
        }
        Ok(has_dependencies)
    }

    /// Extract the whole archive into `target_dir`, skipping the
    /// `dependencies/` subtree (already handled separately).
    pub fn extract_all(&mut self, target_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(target_dir)?;
        for i in 0..self.archive.len() {
            let mut entry = self.archive.by_index(i)?;
            let name = entry.name().to_string();
            if name.starts_with("dependencies/") {
                continue;
            }
            let dest = target_dir.join(&name);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut entry, &mut out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build(path: &Path, files: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: FileOptions<()> = FileOptions::default();
        for (name, contents) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn reads_package_info_and_entry_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build(
            &path,
            &[
                ("package_info.toml", b"name = \"echo\"\nversion = \"1.0.0\"\n"),
                ("entry_points.toml", b"[plugin_host.plugins]\necho = \"pkg.echo:EchoPlugin\"\n"),
            ],
        );

        let mut bundle = Bundle::open(&path).unwrap();
        let info = bundle.package_info().unwrap();
        assert_eq!(info.name, "echo");
        assert_eq!(info.version, "1.0.0");

        let entries = bundle.entry_points().unwrap();
        assert_eq!(entries.names_in_group(PLUGIN_ENTRY_GROUP), vec!["echo".to_string()]);
        assert!(bundle.metadata().unwrap().is_none());
    }

    #[test]
    fn shortest_path_wins_when_a_name_is_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build(
            &path,
            &[
                ("nested/dir/package_info.toml", b"name = \"wrong\"\nversion = \"0.0.0\"\n"),
                ("package_info.toml", b"name = \"right\"\nversion = \"1.0.0\"\n"),
            ],
        );

        let mut bundle = Bundle::open(&path).unwrap();
        let info = bundle.package_info().unwrap();
        assert_eq!(info.name, "right");
    }

    #[test]
    fn extract_dependencies_reports_presence_and_copies_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build(
            &path,
            &[
                ("package_info.toml", b"name = \"echo\"\nversion = \"1.0.0\"\n"),
                ("dependencies/vendor.tar", b"fake vendored archive contents"),
            ],
        );

        let mut bundle = Bundle::open(&path).unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let has_deps = bundle.extract_dependencies(scratch.path()).unwrap();
        assert!(has_deps);
        assert!(scratch.path().join("dependencies/vendor.tar").exists());
    }

    #[test]
    fn extract_all_skips_the_dependencies_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        build(
            &path,
            &[
                ("package_info.toml", b"name = \"echo\"\nversion = \"1.0.0\"\n"),
                ("dependencies/vendor.tar", b"fake vendored archive contents"),
            ],
        );

        let mut bundle = Bundle::open(&path).unwrap();
        let target = tempfile::tempdir().unwrap();
        bundle.extract_all(target.path()).unwrap();
        assert!(target.path().join("package_info.toml").exists());
        assert!(!target.path().join("dependencies").exists());
    }
}
