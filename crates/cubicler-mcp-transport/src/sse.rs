use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cubicler_protocol::{McpRequest, McpResponse, RequestId};
use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex as TokioMutex};
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::http::build_header_map;
use crate::McpTransport;

type PendingMap = Arc<TokioMutex<HashMap<RequestId, oneshot::Sender<McpResponse>>>>;

/// MCP over SSE: requests go out as individual POSTs, responses arrive
/// asynchronously on a long-lived `GET .../sse` stream keyed by `clientId`
/// and correlated back to the waiting caller by JSON-RPC `id`.
pub struct SseMcpTransport {
    identifier: String,
    base_url: String,
    client: reqwest::Client,
    headers: reqwest::header::HeaderMap,
    client_id: String,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    call_timeout: Duration,
    reader: TokioMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SseMcpTransport {
    pub fn new(
        identifier: impl Into<String>,
        url: impl Into<String>,
        headers: Option<&HashMap<String, String>>,
        bearer: Option<&str>,
        call_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut header_map = build_header_map(headers);
        if let Some(token) = bearer {
            header_map.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| TransportError::Malformed(e.to_string()))?,
            );
        }
        let client = reqwest::Client::builder().build()?;
        let base_url = url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            identifier: identifier.into(),
            base_url,
            client,
            headers: header_map,
            client_id: Uuid::new_v4().to_string(),
            pending: Arc::new(TokioMutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            call_timeout,
            reader: TokioMutex::new(None),
        })
    }

    fn post_url(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    fn sse_url(&self) -> String {
        format!("{}/mcp/sse?clientId={}", self.base_url, self.client_id)
    }

    async fn open_stream(&self, open_timeout: Duration) -> Result<(), TransportError> {
        let mut req = self.client.get(self.sse_url()).headers(self.headers.clone());
        req = req.header(ACCEPT, "text/event-stream");

        let mut byte_stream = timeout(open_timeout, req.send())
            .await
            .map_err(|_| TransportError::Timeout)??
            .error_for_status()?
            .bytes_stream();

        self.connected.store(true, Ordering::SeqCst);

        let pending = self.pending.clone();
        let identifier = self.identifier.clone();
        let connected = self.connected.clone();
        let handle = tokio::spawn(async move {
            let mut buf = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let Ok(chunk) = chunk else {
                    warn!(server = %identifier, "sse stream read error");
                    break;
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    let Ok(resp) = serde_json::from_str::<McpResponse>(data) else {
                        trace!(server = %identifier, "ignoring non-response sse frame");
                        continue;
                    };
                    let Some(id) = resp.id.clone() else { continue };
                    let mut guard = pending.lock().await;
                    if let Some(tx) = guard.remove(&id) {
                        let _ = tx.send(resp);
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            debug!(server = %identifier, "sse stream closed");
        });

        *self.reader.lock().await = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseMcpTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        self.open_stream(Duration::from_secs(2)).await?;
        self.request("initialize", Some(serde_json::json!({}))).await?;
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let id = RequestId::from(Uuid::new_v4().to_string());
        let req = McpRequest::new(id.clone(), method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self
            .client
            .post(self.post_url())
            .headers(self.headers.clone())
            .header("x-mcp-client-id", &self.client_id)
            .json(&req)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            self.pending.lock().await.remove(&id);
            return Err(TransportError::Http(e));
        }

        let resp = match timeout(self.call_timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => return Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(TransportError::Timeout);
            }
        };

        match resp.result {
            Some(value) => Ok(value),
            None => Err(TransportError::Upstream(resp.error.unwrap_or_else(|| {
                cubicler_protocol::McpError::internal("provider returned no result")
            }))),
        }
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
    }

    fn server_identifier(&self) -> &str {
        &self.identifier
    }
}
