use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubicler_protocol::{McpRequest, McpResponse, RequestId};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::McpTransport;

type PendingMap = Arc<TokioMutex<HashMap<RequestId, oneshot::Sender<McpResponse>>>>;

/// MCP over a child process's stdin/stdout, newline-delimited JSON-RPC.
///
/// Pooling/queueing across concurrent callers is `cubicler-agent-transport`'s
/// concern for agent-facing stdio; this transport is a single process and a
/// single in-flight conversation, matching one provider-MCP server entry.
pub struct StdioMcpTransport {
    identifier: String,
    child: TokioMutex<Child>,
    stdin: TokioMutex<ChildStdin>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    call_timeout: Duration,
    stop_grace: Duration,
    reader: TokioMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioMcpTransport {
    pub fn spawn(
        identifier: impl Into<String>,
        command: &str,
        args: &[String],
        cwd: Option<&str>,
        env: Option<&HashMap<String, String>>,
        call_timeout: Duration,
        stop_grace: Duration,
    ) -> Result<Self, TransportError> {
        let identifier = identifier.into();
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = env {
            cmd.envs(env);
        }

        let mut child = cmd.spawn().map_err(TransportError::Spawn)?;
        let stdin = child.stdin.take().ok_or(TransportError::ProcessExited)?;
        let stdout = child.stdout.take().ok_or(TransportError::ProcessExited)?;

        let pending: PendingMap = Arc::new(TokioMutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_pending = pending.clone();
        let reader_alive = alive.clone();
        let reader_identifier = identifier.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Ok(resp) = serde_json::from_str::<McpResponse>(&line) else {
                            trace!(server = %reader_identifier, "ignoring unparsable stdio line");
                            continue;
                        };
                        let Some(id) = resp.id.clone() else { continue };
                        let mut guard = reader_pending.lock().await;
                        if let Some(tx) = guard.remove(&id) {
                            let _ = tx.send(resp);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(server = %reader_identifier, error = %e, "stdio read error");
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::SeqCst);
            debug!(server = %reader_identifier, "stdio process stream closed");
        });

        Ok(Self {
            identifier,
            child: TokioMutex::new(child),
            stdin: TokioMutex::new(stdin),
            pending,
            alive,
            call_timeout,
            stop_grace,
            reader: TokioMutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl McpTransport for StdioMcpTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        self.request("initialize", Some(serde_json::json!({}))).await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let id = RequestId::from(Uuid::new_v4().to_string());
        let req = McpRequest::new(id.clone(), method, params);
        let mut line = serde_json::to_string(&req).map_err(|e| TransportError::Malformed(e.to_string()))?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().await.remove(&id);
                return Err(TransportError::Spawn(e));
            }
        }

        match timeout(self.call_timeout, rx).await {
            Ok(Ok(resp)) => match resp.result {
                Some(value) => Ok(value),
                None => Err(TransportError::Upstream(resp.error.unwrap_or_else(|| {
                    cubicler_protocol::McpError::internal("provider returned no result")
                }))),
            },
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        let mut child = self.child.lock().await;
        if timeout(self.stop_grace, child.wait()).await.is_err() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    fn server_identifier(&self) -> &str {
        &self.identifier
    }
}
