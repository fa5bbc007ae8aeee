//! Exercises `ProcessManager` against the real `plugin-child` binary:
//! ensure/reuse, stop, LRU eviction under `max_subprocess` pressure, and
//! concurrent `ensure` calls racing a single bootstrap.

mod common;

use plugin_host::config::RuntimeConfig;
use plugin_host::process_manager::ProcessManager;
use plugin_runtime_sdk::client;
use std::time::Duration;

fn install_echo(extensions: &std::path::Path, name: &str, version: &str) {
    let dir = extensions.join(name).join(version);
    common::unpack_echo_package(&dir);
}

fn runtime_config(extensions: &std::path::Path, storage: &std::path::Path, max_subprocess: usize) -> RuntimeConfig {
    RuntimeConfig {
        max_subprocess,
        extensions_path: extensions.to_path_buf(),
        local_storage_path: storage.to_path_buf(),
        start_process_max_retries: 20,
        start_process_retry_delay: Duration::from_millis(50),
        ..RuntimeConfig::default()
    }
}

#[tokio::test]
async fn ensure_reuses_a_running_child_and_stop_removes_it() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    install_echo(extensions.path(), "echo", "1.0.0");

    let runtime = runtime_config(extensions.path(), storage.path(), 20);
    let manager = ProcessManager::new(runtime, common::plugin_child_binary());

    let (addr1, fresh1) = manager.ensure("echo", "1.0.0").await.unwrap();
    assert!(fresh1);
    let (addr2, fresh2) = manager.ensure("echo", "1.0.0").await.unwrap();
    assert_eq!(addr1, addr2);
    assert!(!fresh2);

    assert_eq!(manager.live_keys().await, vec!["echo-1.0.0".to_string()]);

    manager.stop("echo", "1.0.0").await;
    assert!(manager.live_keys().await.is_empty());
}

#[tokio::test]
async fn ensure_fails_for_an_uninstalled_package() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let runtime = runtime_config(extensions.path(), storage.path(), 20);
    let manager = ProcessManager::new(runtime, common::plugin_child_binary());

    let err = manager.ensure("does-not-exist", "1.0.0").await.unwrap_err();
    assert_eq!(err.http_code(), 404);
}

#[tokio::test]
async fn overflow_evicts_the_least_recently_used_child() {
    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    install_echo(extensions.path(), "echo", "1.0.0");
    install_echo(extensions.path(), "echo", "2.0.0");
    install_echo(extensions.path(), "echo", "3.0.0");

    let runtime = runtime_config(extensions.path(), storage.path(), 2);
    let manager = ProcessManager::new(runtime, common::plugin_child_binary());

    manager.ensure("echo", "1.0.0").await.unwrap();
    manager.ensure("echo", "2.0.0").await.unwrap();
    // Touch 1.0.0 so 2.0.0 becomes the least-recently-used entry.
    manager.ensure("echo", "1.0.0").await.unwrap();
    manager.ensure("echo", "3.0.0").await.unwrap();

    let live = manager.live_keys().await;
    assert_eq!(live.len(), 2);
    assert!(live.contains(&"echo-1.0.0".to_string()));
    assert!(live.contains(&"echo-3.0.0".to_string()));
    assert!(!live.contains(&"echo-2.0.0".to_string()));
}

#[tokio::test]
async fn concurrent_ensure_calls_converge_on_one_bootstrapped_child() {
    use std::sync::Arc;

    let extensions = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    install_echo(extensions.path(), "echo", "1.0.0");

    let runtime = runtime_config(extensions.path(), storage.path(), 20);
    let manager = Arc::new(ProcessManager::new(runtime, common::plugin_child_binary()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move { manager.ensure("echo", "1.0.0").await.unwrap() }));
    }
    let results: Vec<_> = futures::future::join_all(handles).await.into_iter().map(Result::unwrap).collect();

    let addr = results[0].0.clone();
    assert!(results.iter().all(|(a, _)| *a == addr));
    assert_eq!(results.iter().filter(|(_, fresh)| *fresh).count(), 1);

    let addr_s = addr.to_str().unwrap();
    client::confirm_bootstrap(addr_s, "echo", manager.bootstrap_retry()).await.unwrap();
}
