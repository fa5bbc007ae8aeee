//! Child worker binary: one process per `(package, version)`, spawned by
//! `process_manager::ProcessManager::ensure`. Listens on a unix socket,
//! decodes one [`Req`] per connection, dispatches it against the statically
//! linked plugin registry, and writes back a `Resp`.
//!
//! Plugin classes are not dynamically imported: `--package-path` still
//! locates the installed bundle's `entry_points.toml` so this binary can
//! check which plugin names the package actually declares, but the
//! implementations themselves come from `plugin_host::registry`.

use clap::Parser;
use futures::StreamExt;
use plugin_host::registry::Registry;
use plugin_runtime_sdk::envelope::{Action, Req, Resp};
use plugin_runtime_sdk::error::PluginError;
use plugin_runtime_sdk::plugin::Plugin;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    pkg: String,
    #[arg(long)]
    version: String,
    #[arg(long)]
    addr: PathBuf,
    #[arg(long)]
    package_path: PathBuf,
    #[arg(long, default_value_t = 20)]
    blocking_pool_size: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(args.blocking_pool_size.max(1))
        .build()?;
    runtime.block_on(run(args))
}

/// Reads a package's declared entry point names for `plugin_host.plugins`
/// from its unpacked `entry_points.toml`, the child-side counterpart of
/// `Bundle::entry_points` (which reads the same file out of the zip, before
/// install).
fn declared_plugin_names(package_path: &std::path::Path) -> HashMap<String, String> {
    let path = package_path.join("entry_points.toml");
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return HashMap::new();
    };
    #[derive(serde::Deserialize, Default)]
    struct EntryPoints {
        #[serde(flatten)]
        groups: HashMap<String, HashMap<String, String>>,
    }
    let parsed: EntryPoints = toml::from_str(&raw).unwrap_or_default();
    parsed.groups.get("plugin_host.plugins").cloned().unwrap_or_default()
}

struct Dispatcher {
    pkg: String,
    version: String,
    declared: HashMap<String, String>,
    registry: Registry,
    loaded: AsyncMutex<HashMap<String, Arc<dyn Plugin>>>,
}

impl Dispatcher {
    /// Resolve `name` to a loaded plugin instance, memoising it for the
    /// lifetime of this child process. A name the package doesn't declare,
    /// or one with no matching implementation in the static registry, fails
    /// identically with `PluginEntryNotFound`.
    async fn load(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        if !self.declared.contains_key(name) {
            return Err(PluginError::EntryNotFound(name.to_string()));
        }
        let mut loaded = self.loaded.lock().await;
        if let Some(plugin) = loaded.get(name) {
            return Ok(plugin.clone());
        }
        let plugin = self.registry.load(name).ok_or_else(|| PluginError::EntryNotFound(name.to_string()))?;
        loaded.insert(name.to_string(), plugin.clone());
        Ok(plugin)
    }

    fn declared_names_sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.declared.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    async fn handle_non_stream(&self, req: Req) -> Result<Value, PluginError> {
        let action = req.action().ok_or_else(|| PluginError::ActionNotFound(req.action.clone()))?;
        match action {
            Action::RunTool => {
                let plugin = self.load(req.plugin_name()?).await?;
                let tool = req.tool.as_deref().ok_or_else(|| PluginError::new("InvalidRequest", "tool is required", 400))?;
                let input = req.input.unwrap_or(Value::Null);
                let result = plugin.run_tool(tool, input, req.config).await?;
                Ok(result)
            }
            Action::RunValidate => {
                let plugin = self.load(req.plugin_name()?).await?;
                plugin.run_validate(req.config).await?;
                Ok(Value::Null)
            }
            Action::RunMetadata => {
                let plugin = self.load(req.plugin_name()?).await?;
                Ok(serde_json::to_value(plugin.get_metadata())?)
            }
            Action::RunPkgMetadata => {
                let mut metas = Vec::new();
                for name in self.declared_names_sorted() {
                    if let Ok(plugin) = self.load(&name).await {
                        metas.push(plugin.get_metadata());
                    }
                }
                if metas.is_empty() {
                    return Err(PluginError::EntryNotFound(format!("{}-{}", self.pkg, self.version)));
                }
                Ok(serde_json::to_value(metas)?)
            }
            // A pure bootstrap liveness probe: it must succeed as soon as the
            // socket is accepting connections, before any plugin name is known
            // to be valid (callers confirming bootstrap for `run_pkg_metadata`
            // have no single plugin name to give it), so it never loads a
            // plugin.
            Action::RunPing => Ok(Value::String("pong".to_string())),
            Action::RunToolStream => Err(PluginError::new(
                "InvalidRequest",
                "run_tool_stream requires stream=true",
                400,
            )),
        }
    }

    async fn handle_stream(&self, req: Req) -> Result<plugin_runtime_sdk::plugin::ToolStream, PluginError> {
        match req.action() {
            Some(Action::RunToolStream) => {
                let plugin = self.load(req.plugin_name()?).await?;
                let tool = req.tool.as_deref().ok_or_else(|| PluginError::new("InvalidRequest", "tool is required", 400))?;
                let input = req.input.unwrap_or(Value::Null);
                plugin.run_tool_stream(tool, input, req.config).await
            }
            Some(_) => Err(PluginError::new("InvalidRequest", "stream=true only valid for run_tool_stream", 400)),
            None => Err(PluginError::ActionNotFound(req.action.clone())),
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let declared = declared_plugin_names(&args.package_path);
    let dispatcher = Arc::new(Dispatcher {
        pkg: args.pkg.clone(),
        version: args.version.clone(),
        declared,
        registry: Registry::new(),
        loaded: AsyncMutex::new(HashMap::new()),
    });

    let _ = tokio::fs::remove_file(&args.addr).await;
    if let Some(parent) = args.addr.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let listener = UnixListener::bind(&args.addr)?;
    tracing::info!(pkg = %args.pkg, version = %args.version, addr = %args.addr.display(), "plugin child listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let mut in_flight = tokio::task::JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let dispatcher = dispatcher.clone();
                in_flight.spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        tracing::warn!(error = %e, "connection handling failed");
                    }
                });
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, draining and shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, draining and shutting down");
                break;
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    let _ = tokio::fs::remove_file(&args.addr).await;
    Ok(())
}

/// Handle one connection: read the whole request to EOF, dispatch it, and
/// write back either a single JSON response (half-closing afterward) or a
/// newline-delimited stream of responses ending in at most one error frame,
/// per §4.4.
async fn handle_connection(mut stream: UnixStream, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;

    let req: Req = match serde_json::from_slice(&buf) {
        Ok(req) => req,
        Err(e) => {
            let resp = Resp::err(PluginError::from(e).to_envelope());
            write_and_close(&mut stream, &resp).await?;
            return Ok(());
        }
    };

    if req.stream {
        match dispatcher.handle_stream(req).await {
            Ok(mut items) => {
                while let Some(item) = items.next().await {
                    let resp = match item {
                        Ok(value) => Resp::ok(value),
                        Err(e) => {
                            let resp = Resp::err(e.to_envelope());
                            write_line(&mut stream, &resp).await?;
                            stream.shutdown().await?;
                            return Ok(());
                        }
                    };
                    write_line(&mut stream, &resp).await?;
                }
                stream.shutdown().await?;
            }
            Err(e) => {
                let resp = Resp::err(e.to_envelope());
                write_line(&mut stream, &resp).await?;
                stream.shutdown().await?;
            }
        }
        return Ok(());
    }

    let resp = match dispatcher.handle_non_stream(req).await {
        Ok(value) => Resp::ok(value),
        Err(e) => Resp::err(e.to_envelope()),
    };
    write_and_close(&mut stream, &resp).await?;
    Ok(())
}

async fn write_and_close(stream: &mut UnixStream, resp: &Resp) -> anyhow::Result<()> {
    let body = serde_json::to_vec(resp)?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn write_line(stream: &mut UnixStream, resp: &Resp) -> anyhow::Result<()> {
    let mut body = serde_json::to_vec(resp)?;
    body.push(b'\n');
    stream.write_all(&body).await?;
    Ok(())
}
