//! Shared fixtures for the integration test binaries under `tests/`: a
//! minimal zip-bundle builder and a helper that spawns the real
//! `plugin-child` binary against an unpacked package directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zip::write::FileOptions;

/// Build a zip bundle at `path` containing `files` (relative path, raw
/// bytes).
pub fn build_bundle(path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options: FileOptions<()> = FileOptions::default();
    for (name, contents) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap();
}

/// Build a minimal echo-plugin bundle declaring the `echo` entry point.
pub fn build_echo_bundle(path: &Path) {
    build_bundle(
        path,
        &[
            ("package_info.toml", b"name = \"echo\"\nversion = \"1.0.0\"\n"),
            ("entry_points.toml", b"[plugin_host.plugins]\necho = \"pkg.echo:EchoPlugin\"\n"),
        ],
    );
}

/// Unpack an echo-plugin package directly onto disk (bypassing the
/// installer), for tests that only need a package directory to point a
/// child process at.
pub fn unpack_echo_package(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("package_info.toml"), b"name = \"echo\"\nversion = \"1.0.0\"\n").unwrap();
    std::fs::write(
        dir.join("entry_points.toml"),
        b"[plugin_host.plugins]\necho = \"pkg.echo:EchoPlugin\"\n",
    )
    .unwrap();
}

pub fn plugin_child_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_plugin-child"))
}

/// Spawn a `plugin-child` process listening on `addr` against `package_path`,
/// waiting for its socket file to appear before returning.
pub async fn spawn_child(addr: &Path, package_path: &Path) -> tokio::process::Child {
    let _ = tokio::fs::remove_file(addr).await;
    if let Some(parent) = addr.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    let child = tokio::process::Command::new(plugin_child_binary())
        .arg("--pkg").arg("echo")
        .arg("--version").arg("1.0.0")
        .arg("--addr").arg(addr)
        .arg("--package-path").arg(package_path)
        .arg("--blocking-pool-size").arg("4")
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    for _ in 0..200 {
        if addr.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    child
}
