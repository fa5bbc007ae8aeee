//! Unix-socket client used by the process manager to talk to a child
//! worker: single-shot request/response and streaming request/response,
//! plus the bootstrap retry helper a freshly spawned child needs while its
//! listener is still coming up.

use crate::envelope::{Req, Resp};
use crate::error::PluginError;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Retry policy for connecting to a child whose listener may not have
/// started accepting yet. Mirrors `start_process_max_retries` /
/// `start_process_retry_delay`.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapRetry {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for BootstrapRetry {
    fn default() -> Self {
        BootstrapRetry {
            max_retries: 10,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Whether an I/O error is a transient "the listener isn't up yet" failure
/// worth retrying, as opposed to anything else (including a successfully
/// decoded error envelope, which is never retried).
fn is_transient_connect_error(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound)
}

/// Send one request over a fresh connection to `addr` and read the single
/// JSON response to EOF (§4.4: non-streaming responses are exactly one JSON
/// object followed by a half-close).
pub async fn request(addr: &str, req: &Req) -> Result<Value, PluginError> {
    let mut stream = UnixStream::connect(addr).await?;
    let body = serde_json::to_vec(req)?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let resp: Resp = serde_json::from_slice(&buf)?;
    resp.into_result().map_err(PluginError::from)
}

/// Like [`request`], but retries transient connect failures per
/// `policy`. Never retries once a connection was established and a
/// response (even an error response) was decoded.
pub async fn request_with_retry(addr: &str, req: &Req, policy: BootstrapRetry) -> Result<Value, PluginError> {
    let mut attempt = 0;
    loop {
        match request(addr, req).await {
            Ok(v) => return Ok(v),
            Err(PluginError::Io(e)) if is_transient_connect_error(&e) && attempt < policy.max_retries => {
                attempt += 1;
                tracing::debug!(attempt, addr, "child not ready yet, retrying connect");
                tokio::time::sleep(policy.retry_delay).await;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open a connection, send one request, and yield newline-delimited JSON
/// frames until the peer half-closes (§4.4: streaming responses). Each
/// frame is individually decoded and unwrapped the way [`request`] unwraps
/// its single frame; an error frame ends the stream with `Err`.
pub async fn request_stream(addr: &str, req: &Req) -> Result<BoxStream<'static, Result<Value, PluginError>>, PluginError> {
    let mut conn = UnixStream::connect(addr).await?;
    let body = serde_json::to_vec(req)?;
    conn.write_all(&body).await?;
    conn.shutdown().await?;

    let reader = tokio::io::BufReader::new(conn);
    use tokio::io::AsyncBufReadExt;
    let lines = tokio_stream::wrappers::LinesStream::new(reader.lines());

    let mapped = lines.filter_map(|line| async move {
        match line {
            Ok(l) if l.is_empty() => None,
            Ok(l) => match serde_json::from_str::<Resp>(&l) {
                Ok(resp) => Some(resp.into_result().map_err(PluginError::from)),
                Err(e) => Some(Err(PluginError::from(e))),
            },
            Err(e) => Some(Err(PluginError::from(e))),
        }
    });

    Ok(Box::pin(mapped))
}

/// Confirms a freshly started child has finished bootstrapping by running
/// `run_ping` under the retry policy before the caller opens a real stream.
/// A failed ping attempt consumes retry budget exactly like any other
/// connect attempt.
pub async fn confirm_bootstrap(addr: &str, plugin: &str, policy: BootstrapRetry) -> Result<(), PluginError> {
    request_with_retry(addr, &Req::run_ping(plugin), policy).await?;
    Ok(())
}

/// Adapt a single non-streaming value into a one-shot stream, used by
/// callers that need a uniform stream interface regardless of whether the
/// underlying tool call was streaming.
pub fn once(value: Result<Value, PluginError>) -> BoxStream<'static, Result<Value, PluginError>> {
    Box::pin(stream::once(async move { value }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_connection_refused_or_not_found() {
        assert!(is_transient_connect_error(&std::io::Error::from(ErrorKind::ConnectionRefused)));
        assert!(is_transient_connect_error(&std::io::Error::from(ErrorKind::NotFound)));
        assert!(!is_transient_connect_error(&std::io::Error::from(ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn request_with_retry_gives_up_once_the_retry_budget_is_spent() {
        let policy = BootstrapRetry { max_retries: 2, retry_delay: Duration::from_millis(5) };
        let req = Req::run_ping("whatever");

        let err = request_with_retry("/tmp/plugin-host-test-does-not-exist.sock", &req, policy)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
