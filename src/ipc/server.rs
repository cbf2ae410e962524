//! Stdio bridge server — read loop, per-call tasks, single writer.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ipc::codec::{read_message, write_message, Frame};
use crate::ipc::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::ipc::router::Router;
use crate::tools::ToolRegistry;
use crate::types::ServerConfig;

/// Methods handled on their own task; everything else is answered inline.
const CONCURRENT_METHODS: &[&str] = &["tools/call", "registry/status"];

/// JSON-RPC server fronting one registry.
#[derive(Debug)]
pub struct BridgeServer {
    router: Router,
    cancel: CancellationToken,
    config: ServerConfig,
}

impl BridgeServer {
    pub fn new(registry: Arc<ToolRegistry>, config: ServerConfig) -> Self {
        Self {
            router: Router::new(registry),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Token that stops the read loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until EOF or cancellation. In-flight calls are drained before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let max_in_flight = self.config.max_in_flight.max(1);
        let write_timeout = Duration::from_secs(self.config.write_timeout_secs);
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(max_in_flight * 2);
        let writer_task = tokio::spawn(write_loop(writer, rx, write_timeout));

        let in_flight = Arc::new(Semaphore::new(max_in_flight));
        let mut tasks = JoinSet::new();
        let mut reader = BufReader::new(reader);

        tracing::info!(
            max_in_flight,
            max_message_bytes = self.config.max_message_bytes,
            "Bridge server listening on stdio"
        );

        let read_result = loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Bridge server shutting down");
                    break Ok(());
                }
                frame = read_message(&mut reader, self.config.max_message_bytes) => frame,
            };

            // Reap finished calls so the set stays bounded.
            while tasks.try_join_next().is_some() {}

            let line = match frame {
                Err(e) => break Err(e),
                Ok(None) => {
                    tracing::info!("Input closed");
                    break Ok(());
                }
                Ok(Some(Frame::Oversized(len))) => {
                    tracing::warn!(len, max = self.config.max_message_bytes, "Oversized message skipped");
                    let response = JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::new(
                            JsonRpcError::INVALID_REQUEST,
                            format!("Message too large: {} bytes", len),
                        ),
                    );
                    if tx.send(response).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
                Ok(Some(Frame::Message(line))) => line,
            };
            if line.trim().is_empty() {
                continue;
            }

            let request = match JsonRpcRequest::parse(&line) {
                Ok(request) => request,
                Err(response) => {
                    tracing::warn!(code = ?response.error.as_ref().map(|e| e.code), "Rejected malformed request");
                    if tx.send(response).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
            };

            tracing::debug!(method = %request.method, id = ?request.id, "Incoming request");

            if CONCURRENT_METHODS.contains(&request.method.as_str()) {
                let Ok(permit) = in_flight.clone().acquire_owned().await else {
                    break Ok(());
                };
                let router = self.router.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let response = router.handle(request).await;
                    drop(permit);
                    if let Some(response) = response {
                        let _ = tx.send(response).await;
                    }
                });
            } else if let Some(response) = self.router.handle(request).await {
                if tx.send(response).await.is_err() {
                    break Ok(());
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Request task failed");
            }
        }
        drop(tx);

        let write_result = match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        };
        read_result.and(write_result)
    }
}

/// Serialise responses onto the output, one per line.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
    timeout: Duration,
) -> std::io::Result<()> {
    while let Some(response) = rx.recv().await {
        let line = serde_json::to_string(&response)?;
        timed_write(&mut writer, &line, timeout).await?;
    }
    Ok(())
}

/// Write a line with a timeout. Returns an error if the write takes too long
/// (a stalled reader on the other end must not wedge the server).
async fn timed_write<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
    timeout: Duration,
) -> std::io::Result<()> {
    tokio::time::timeout(timeout, write_message(writer, line))
        .await
        .map_err(|_| {
            tracing::warn!("Write timeout ({}s), closing output", timeout.as_secs());
            std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout")
        })?
}
