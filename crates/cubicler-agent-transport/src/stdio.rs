use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cubicler_mcp_dispatcher::McpDispatcher;
use cubicler_protocol::{McpRequest, McpResponse, RequestId};
use cubicler_types::{AgentRequest, AgentResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{Mutex as TokioMutex, Notify};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::AgentTransportError;
use crate::{validate_response, AgentTransport};

/// One pooled worker process (spec §4.8.3 state machine: Spawned -> Ready ->
/// Busy -> Ready -> ... -> idle timeout -> Terminated). I/O is behind its own
/// mutex so a dispatch can hold it across awaits while the pool mutex
/// (guarding `busy`/`last_used` for scheduling) stays a quick, sync section.
struct WorkerIo {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
}

struct Worker {
    io: TokioMutex<WorkerIo>,
    busy: AtomicBool,
    last_used: StdMutex<Instant>,
    is_primary: bool,
}

/// Spec §4.8.3: an MCP-over-stdio agent transport backed by a pool of
/// worker processes. The primary worker (index 0) never idles out; extras
/// spawn on demand up to `max_pool_size` and are reaped after `max_idle_time`.
pub struct StdioAgentTransport {
    command: String,
    args: Vec<String>,
    cwd: Option<String>,
    env: Option<std::collections::HashMap<String, String>>,
    max_pool_size: usize,
    max_idle_time: Duration,
    queue_max_size: usize,
    queue_timeout: Duration,
    call_timeout: Duration,
    stop_grace: Duration,
    dispatcher: Arc<McpDispatcher>,
    next_id: AtomicU64,
    workers: StdMutex<Vec<Arc<Worker>>>,
    cursor: AtomicUsize,
    waiting: AtomicUsize,
    released: Notify,
}

#[allow(clippy::too_many_arguments)]
impl StdioAgentTransport {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        cwd: Option<String>,
        env: Option<std::collections::HashMap<String, String>>,
        max_pool_size: usize,
        max_idle_time: Duration,
        queue_max_size: usize,
        queue_timeout: Duration,
        call_timeout: Duration,
        stop_grace: Duration,
        dispatcher: Arc<McpDispatcher>,
    ) -> Result<Self, AgentTransportError> {
        let transport = Self {
            command: command.into(),
            args,
            cwd,
            env,
            max_pool_size: max_pool_size.max(1),
            max_idle_time,
            queue_max_size,
            queue_timeout,
            call_timeout,
            stop_grace,
            dispatcher,
            next_id: AtomicU64::new(1),
            workers: StdMutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            released: Notify::new(),
        };
        let primary = transport.spawn_worker(true)?;
        transport.workers.lock().unwrap().push(Arc::new(primary));
        Ok(transport)
    }

    fn spawn_worker(&self, is_primary: bool) -> Result<Worker, AgentTransportError> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = &self.env {
            cmd.envs(env);
        }

        let mut child = cmd.spawn().map_err(AgentTransportError::Spawn)?;
        let stdin = child.stdin.take().ok_or(AgentTransportError::ProcessExited)?;
        let stdout = child.stdout.take().ok_or(AgentTransportError::ProcessExited)?;
        let lines = BufReader::new(stdout).lines();

        Ok(Worker {
            io: TokioMutex::new(WorkerIo { stdin, lines, child }),
            busy: AtomicBool::new(true),
            last_used: StdMutex::new(Instant::now()),
            is_primary,
        })
    }

    /// Round-robin scan for a Ready worker; spawns one more if below
    /// capacity, else enqueues behind `released` up to `queue_max_size`
    /// waiters before failing with `PoolSaturated` (spec §4.8.3/§5).
    async fn acquire(&self) -> Result<Arc<Worker>, AgentTransportError> {
        loop {
            if let Some(worker) = self.try_claim_ready() {
                return Ok(worker);
            }

            let can_spawn = self.workers.lock().unwrap().len() < self.max_pool_size;
            if can_spawn {
                let worker = Arc::new(self.spawn_worker(false)?);
                self.workers.lock().unwrap().push(worker.clone());
                return Ok(worker);
            }

            if self.waiting.load(Ordering::SeqCst) >= self.queue_max_size {
                return Err(AgentTransportError::PoolSaturated);
            }
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let notified = self.released.notified();
            let outcome = timeout(self.queue_timeout, notified).await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            if outcome.is_err() {
                return Err(AgentTransportError::PoolSaturated);
            }
        }
    }

    fn try_claim_ready(&self) -> Option<Arc<Worker>> {
        let workers = self.workers.lock().unwrap();
        if workers.is_empty() {
            return None;
        }
        let len = workers.len();
        let start = self.cursor.load(Ordering::SeqCst) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let worker = &workers[idx];
            if worker
                .busy
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.cursor.store((idx + 1) % len, Ordering::SeqCst);
                return Some(worker.clone());
            }
        }
        None
    }

    fn release(&self, worker: &Worker) {
        *worker.last_used.lock().unwrap() = Instant::now();
        worker.busy.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }

    /// Drops idle, non-primary workers past `max_idle_time`. Callers (the
    /// orchestrator's background maintenance loop) invoke this periodically;
    /// it performs no process I/O of its own beyond killing the child.
    pub async fn reap_idle(&self) {
        let idle: Vec<Arc<Worker>> = {
            let workers = self.workers.lock().unwrap();
            workers
                .iter()
                .filter(|w| {
                    !w.is_primary
                        && !w.busy.load(Ordering::SeqCst)
                        && w.last_used.lock().unwrap().elapsed() >= self.max_idle_time
                })
                .cloned()
                .collect()
        };
        for worker in idle {
            let mut io = worker.io.lock().await;
            let _ = timeout(self.stop_grace, io.child.wait()).await;
            let _ = io.child.start_kill();
            drop(io);
            self.workers.lock().unwrap().retain(|w| !Arc::ptr_eq(w, &worker));
            debug!("reaped idle stdio agent worker");
        }
    }

    async fn run_on_worker(&self, worker: &Worker, request: AgentRequest) -> Result<AgentResponse, AgentTransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = McpRequest::new(RequestId::from(id as i64), "dispatch", Some(serde_json::to_value(&request).map_err(|e| AgentTransportError::Malformed(e.to_string()))?));
        let mut line = serde_json::to_string(&req).map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
        line.push('\n');

        let mut io = worker.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await.map_err(AgentTransportError::Spawn)?;

        let deadline = Instant::now() + self.call_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AgentTransportError::Timeout);
            }
            let line = match timeout(remaining, io.lines.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => return Err(AgentTransportError::ProcessExited),
                Ok(Err(e)) => return Err(AgentTransportError::Spawn(e)),
                Err(_) => return Err(AgentTransportError::Timeout),
            };

            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => {
                    trace!("ignoring unparsable line from stdio agent worker");
                    continue;
                }
            };

            if is_inbound_request(&value) {
                self.service_inbound(&mut io, value).await?;
                continue;
            }

            let response: McpResponse = serde_json::from_value(value).map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
            if response.id != Some(RequestId::from(id as i64)) {
                continue;
            }
            return match response.result {
                Some(result) => {
                    let agent_response: AgentResponse =
                        serde_json::from_value(result).map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
                    validate_response(&agent_response)?;
                    Ok(agent_response)
                }
                None => Err(AgentTransportError::IncompleteResponse(
                    response.error.map(|e| e.message).unwrap_or_else(|| "worker returned no result".to_string()),
                )),
            };
        }
    }

    /// The worker called back into us for `tools/list`/`tools/call` mid-dispatch;
    /// forward it to the MCP dispatcher and write the framed response back.
    async fn service_inbound(&self, io: &mut WorkerIo, value: serde_json::Value) -> Result<(), AgentTransportError> {
        let req: McpRequest = serde_json::from_value(value).map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
        let resp = self.dispatcher.handle_request(req).await;
        let mut line = serde_json::to_string(&resp).map_err(|e| AgentTransportError::Malformed(e.to_string()))?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await.map_err(AgentTransportError::Spawn)?;
        Ok(())
    }
}

fn is_inbound_request(value: &serde_json::Value) -> bool {
    value.get("method").is_some() && value.get("result").is_none() && value.get("error").is_none()
}

#[async_trait]
impl AgentTransport for StdioAgentTransport {
    async fn dispatch(&self, request: AgentRequest) -> Result<AgentResponse, AgentTransportError> {
        let worker = self.acquire().await?;
        let result = self.run_on_worker(&worker, request).await;
        match &result {
            Ok(_) => self.release(&worker),
            Err(e) => {
                warn!(error = %e, "stdio agent worker failed, terminating it");
                let mut io = worker.io.lock().await;
                let _ = io.child.start_kill();
                drop(io);
                self.workers.lock().unwrap().retain(|w| !Arc::ptr_eq(w, &worker));
                self.released.notify_one();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_protocol::{McpError, ToolProvider};
    use cubicler_types::{AgentContext, ToolDefinition};
    use pretty_assertions::assert_eq;

    struct EmptyProvider;

    #[async_trait]
    impl ToolProvider for EmptyProvider {
        async fn can_handle(&self, _tool_name: &str) -> bool {
            false
        }
        async fn list_tools(&self) -> Vec<ToolDefinition> {
            vec![]
        }
        async fn call_tool(&self, _tool_name: &str, _arguments: serde_json::Value) -> Result<serde_json::Value, McpError> {
            Err(McpError::method_not_found("unused in this test"))
        }
    }

    fn dispatcher() -> Arc<McpDispatcher> {
        Arc::new(McpDispatcher::new(
            Arc::new(EmptyProvider),
            Arc::new(EmptyProvider),
            Arc::new(EmptyProvider),
        ))
    }

    fn sample_request() -> AgentRequest {
        AgentRequest {
            agent: AgentContext {
                identifier: "a1".into(),
                name: "Agent".into(),
                description: String::new(),
                prompt: "be helpful".into(),
            },
            tools: vec![],
            servers: vec![],
            messages: vec![],
        }
    }

    /// A tiny shell worker that reads one JSON-RPC line and echoes back a
    /// fixed `AgentResponse` under the same request id, as a real provider
    /// process speaking the §4.8.3 protocol would.
    fn echo_script() -> Vec<String> {
        vec![
            "-c".to_string(),
            r#"read line; id=$(echo "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p'); printf '{"jsonrpc":"2.0","id":%s,"result":{"timestamp":"2024-01-01T00:00:00Z","type":"text","content":"ack","metadata":{"used_token":1,"used_tools":0}}}\n' "$id""#
                .to_string(),
        ]
    }

    #[tokio::test]
    async fn dispatch_round_trips_through_a_worker_process() {
        let transport = StdioAgentTransport::new(
            "sh",
            echo_script(),
            None,
            None,
            2,
            Duration::from_secs(300),
            4,
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(2),
            dispatcher(),
        )
        .unwrap();

        let resp = transport.dispatch(sample_request()).await.unwrap();
        assert_eq!(resp.content, serde_json::json!("ack"));
    }

    #[tokio::test]
    async fn pool_saturates_when_every_worker_is_busy_and_queue_is_full() {
        let transport = Arc::new(
            StdioAgentTransport::new(
                "sh",
                vec!["-c".to_string(), "sleep 5".to_string()],
                None,
                None,
                1,
                Duration::from_secs(300),
                0,
                Duration::from_millis(50),
                Duration::from_secs(5),
                Duration::from_secs(1),
                dispatcher(),
            )
            .unwrap(),
        );

        let busy = transport.clone();
        let handle = tokio::spawn(async move { busy.dispatch(sample_request()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = transport.dispatch(sample_request()).await.unwrap_err();
        assert!(matches!(err, AgentTransportError::PoolSaturated));
        handle.abort();
    }
}
