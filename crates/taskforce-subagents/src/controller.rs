//! Subagent handle registry and state machine.
//!
//! Each handle moves between `running` and `idle`; `closed` is terminal.
//! At most one run is in flight per handle. Inputs sent while a run is in
//! flight queue up in FIFO order and are consumed by `resume_agent` or by the
//! next `send_input` once the handle is idle.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskforce_protocols::error::AgentError;
use taskforce_protocols::types::Message;

use crate::config::ResolvedSubagentConfig;
use crate::error::SubagentError;
use crate::runner::{BackgroundSink, SubagentOutput, SubagentRequest, SubagentRunner};

/// Actions valid on a handle that is not closed.
const OPEN_ACTIONS: &[&str] = &["send_input", "resume_agent", "wait", "close_agent"];

pub const NOTICE_OPEN: &str = "<subagent_notification>";
pub const NOTICE_CLOSE: &str = "</subagent_notification>";

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Idle,
    Closed,
}

impl AgentStatus {
    fn available_actions(self) -> Vec<&'static str> {
        match self {
            AgentStatus::Closed => Vec::new(),
            _ => OPEN_ACTIONS.to_vec(),
        }
    }
}

/// Outcome of the last finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub steps: u32,
    pub total_cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The run was aborted rather than failed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl RunResult {
    fn from_run(result: &Result<SubagentOutput, AgentError>) -> Self {
        match result {
            Ok(output) => Self {
                text: Some(output.text.clone()),
                steps: output.steps,
                total_cost_usd: output.total_cost_usd,
                error: None,
                cancelled: false,
            },
            Err(err) if err.is_cancellation() => Self {
                cancelled: true,
                ..Default::default()
            },
            Err(err) => Self {
                error: Some(err.to_string()),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub max_steps: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpawnOutcome {
    pub agent_id: String,
    pub model: String,
    pub status: AgentStatus,
    pub available_actions: Vec<&'static str>,
}

/// Result of `send_input` and `resume_agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    RunStarted { agent_id: String },
    InputQueued { agent_id: String, pending_inputs: usize },
}

/// Per-handle state reported by `wait`.
#[derive(Debug, Clone, Serialize)]
pub struct HandleReport {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<RunResult>,
    pub pending_inputs: usize,
    pub available_actions: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitOutcome {
    pub timed_out: bool,
    pub statuses: BTreeMap<String, HandleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseOutcome {
    pub status: AgentStatus,
    /// A run was in flight and has been cancelled.
    pub cancelled: bool,
    pub available_actions: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub model: String,
    pub depth: u32,
    pub status: AgentStatus,
    pub pending_inputs: usize,
    pub turns: usize,
}

struct AgentHandle {
    seq: u64,
    model: String,
    instructions: Option<String>,
    max_steps: Option<u32>,
    status: AgentStatus,
    transcript: Vec<Message>,
    pending: VecDeque<Message>,
    cancel: CancellationToken,
    /// Incremented per run; completions of older runs are ignored.
    run: u64,
    last_result: Option<RunResult>,
    waiters: usize,
    status_tx: watch::Sender<AgentStatus>,
}

impl AgentHandle {
    fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.status_tx.send_replace(status);
    }

    fn report(&self) -> HandleReport {
        HandleReport {
            status: self.status,
            last_result: self.last_result.clone(),
            pending_inputs: self.pending.len(),
            available_actions: self.status.available_actions(),
        }
    }
}

/// Owns the child handles of one agent run.
pub struct SubagentController {
    config: ResolvedSubagentConfig,
    runner: Arc<dyn SubagentRunner>,
    sink: Option<Arc<dyn BackgroundSink>>,
    handles: Mutex<HashMap<String, AgentHandle>>,
    next_seq: AtomicU64,
}

impl SubagentController {
    pub fn new(config: ResolvedSubagentConfig, runner: Arc<dyn SubagentRunner>) -> Self {
        Self {
            config,
            runner,
            sink: None,
            handles: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn with_background_sink(mut self, sink: Arc<dyn BackgroundSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ResolvedSubagentConfig {
        &self.config
    }

    /// Create a handle and start its first run.
    pub fn spawn(
        self: &Arc<Self>,
        input: Message,
        options: SpawnOptions,
    ) -> Result<SpawnOutcome, SubagentError> {
        if !self.config.tools_enabled() {
            return Err(SubagentError::Disabled(self.config.depth));
        }
        let model = options
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.model.clone());

        let mut handles = self.handles.lock();
        let live = handles
            .values()
            .filter(|h| h.status != AgentStatus::Closed)
            .count();
        if live >= self.config.max_agents {
            return Err(SubagentError::MaxAgentsReached(self.config.max_agents));
        }

        let agent_id = uuid::Uuid::new_v4().to_string();
        let (status_tx, _) = watch::channel(AgentStatus::Running);
        let mut handle = AgentHandle {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            model: model.clone(),
            instructions: options.instructions.filter(|i| !i.trim().is_empty()),
            max_steps: options.max_steps,
            status: AgentStatus::Running,
            transcript: vec![input],
            pending: VecDeque::new(),
            cancel: CancellationToken::new(),
            run: 0,
            last_result: None,
            waiters: 0,
            status_tx,
        };
        self.start_run(&agent_id, &mut handle);
        handles.insert(agent_id.clone(), handle);

        info!(
            "Spawned subagent {} (model={}, depth={})",
            agent_id,
            model,
            self.config.depth + 1
        );
        Ok(SpawnOutcome {
            agent_id,
            model,
            status: AgentStatus::Running,
            available_actions: AgentStatus::Running.available_actions(),
        })
    }

    /// Start a run with `input` if idle, otherwise queue it.
    pub fn send_input(
        self: &Arc<Self>,
        agent_id: &str,
        input: Message,
    ) -> Result<SendOutcome, SubagentError> {
        let mut handles = self.handles.lock();
        let handle = open_handle(&mut handles, agent_id)?;

        match handle.status {
            AgentStatus::Running => {
                handle.pending.push_back(input);
                let pending_inputs = handle.pending.len();
                debug!(
                    "Queued input for subagent {} ({} pending)",
                    agent_id, pending_inputs
                );
                Ok(SendOutcome::InputQueued {
                    agent_id: agent_id.to_string(),
                    pending_inputs,
                })
            }
            _ => {
                // Older queued inputs go first.
                handle.pending.push_back(input);
                if let Some(next) = handle.pending.pop_front() {
                    handle.transcript.push(next);
                }
                self.start_run(agent_id, handle);
                Ok(SendOutcome::RunStarted {
                    agent_id: agent_id.to_string(),
                })
            }
        }
    }

    /// Start a run from the oldest queued input of an idle handle.
    pub fn resume(self: &Arc<Self>, agent_id: &str) -> Result<SendOutcome, SubagentError> {
        let mut handles = self.handles.lock();
        let handle = open_handle(&mut handles, agent_id)?;
        if handle.status != AgentStatus::Idle {
            return Err(SubagentError::NotIdle(agent_id.to_string()));
        }
        let next = handle
            .pending
            .pop_front()
            .ok_or_else(|| SubagentError::NoPendingInputs(agent_id.to_string()))?;
        handle.transcript.push(next);
        self.start_run(agent_id, handle);
        Ok(SendOutcome::RunStarted {
            agent_id: agent_id.to_string(),
        })
    }

    /// Wait until any of `ids` leaves `running`, or the timeout fires.
    ///
    /// The result always reports every requested handle.
    pub async fn wait(
        &self,
        ids: &[String],
        timeout_ms: Option<i64>,
    ) -> Result<WaitOutcome, SubagentError> {
        if ids.is_empty() {
            return Err(SubagentError::MissingTargets);
        }
        let deadline = Instant::now() + self.config.wait_timeout(timeout_ms)?;

        let receivers = {
            let mut handles = self.handles.lock();
            if let Some(missing) = ids.iter().find(|id| !handles.contains_key(id.as_str())) {
                return Err(SubagentError::NotFound(missing.clone()));
            }
            let mut receivers = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(handle) = handles.get_mut(id) {
                    handle.waiters += 1;
                    receivers.push(handle.status_tx.subscribe());
                }
            }
            receivers
        };
        let guard = WaiterGuard {
            controller: self,
            ids,
        };

        let settled = receivers
            .iter()
            .any(|rx| *rx.borrow() != AgentStatus::Running);
        let timed_out = if settled {
            false
        } else {
            let mut changes: FuturesUnordered<_> = receivers
                .into_iter()
                .map(|mut rx| async move {
                    let changed = rx.wait_for(|s| *s != AgentStatus::Running).await;
                    changed.is_ok()
                })
                .collect();
            loop {
                match timeout_at(deadline, changes.next()).await {
                    Ok(Some(true)) => break false,
                    Ok(Some(false)) => continue,
                    Ok(None) => break false,
                    Err(_) => break true,
                }
            }
        };
        drop(guard);

        let handles = self.handles.lock();
        let statuses = ids
            .iter()
            .filter_map(|id| handles.get(id).map(|h| (id.clone(), h.report())))
            .collect();
        Ok(WaitOutcome {
            timed_out,
            statuses,
        })
    }

    /// Cancel any in-flight run and close the handle.
    pub fn close(&self, agent_id: &str) -> Result<CloseOutcome, SubagentError> {
        let mut handles = self.handles.lock();
        let handle = open_handle(&mut handles, agent_id)?;
        let cancelled = close_handle(handle);
        info!("Closed subagent {} (cancelled={})", agent_id, cancelled);
        Ok(CloseOutcome {
            status: AgentStatus::Closed,
            cancelled,
            available_actions: Vec::new(),
        })
    }

    /// Close several handles at once.
    ///
    /// Every id is checked before any handle is touched, so an unknown or
    /// closed id leaves all of them open.
    pub fn close_many(
        &self,
        agent_ids: &[String],
    ) -> Result<BTreeMap<String, CloseOutcome>, SubagentError> {
        let mut handles = self.handles.lock();
        for id in agent_ids {
            open_handle(&mut handles, id)?;
        }

        let mut outcomes = BTreeMap::new();
        for id in agent_ids {
            if outcomes.contains_key(id) {
                continue;
            }
            if let Some(handle) = handles.get_mut(id) {
                let cancelled = close_handle(handle);
                info!("Closed subagent {} (cancelled={})", id, cancelled);
                outcomes.insert(
                    id.clone(),
                    CloseOutcome {
                        status: AgentStatus::Closed,
                        cancelled,
                        available_actions: Vec::new(),
                    },
                );
            }
        }
        Ok(outcomes)
    }

    /// Close every open handle. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let mut handles = self.handles.lock();
        let mut closed = 0;
        for (id, handle) in handles.iter_mut() {
            if handle.status == AgentStatus::Closed {
                continue;
            }
            let cancelled = close_handle(handle);
            debug!("Closed subagent {} on teardown (cancelled={})", id, cancelled);
            closed += 1;
        }
        if closed > 0 {
            info!("Closed {} subagents on teardown", closed);
        }
        closed
    }

    /// Every handle in spawn order.
    pub fn list(&self) -> Vec<AgentSummary> {
        let handles = self.handles.lock();
        let mut entries: Vec<_> = handles.iter().collect();
        entries.sort_by_key(|(_, h)| h.seq);
        entries
            .into_iter()
            .map(|(id, h)| AgentSummary {
                agent_id: id.clone(),
                model: h.model.clone(),
                depth: self.config.depth + 1,
                status: h.status,
                pending_inputs: h.pending.len(),
                turns: h.transcript.len(),
            })
            .collect()
    }

    /// Replace the run token, mark running and launch the runner.
    fn start_run(self: &Arc<Self>, agent_id: &str, handle: &mut AgentHandle) {
        handle.run += 1;
        handle.cancel = CancellationToken::new();
        handle.set_status(AgentStatus::Running);

        let run = handle.run;
        let cancel = handle.cancel.clone();
        let request = SubagentRequest {
            agent_id: agent_id.to_string(),
            model: handle.model.clone(),
            depth: self.config.depth + 1,
            input: handle.transcript.clone(),
            instructions: handle.instructions.clone(),
            max_steps: handle.max_steps,
            cancel: cancel.clone(),
        };
        debug!("Starting run {} of subagent {}", run, agent_id);

        let controller = Arc::clone(self);
        let agent_id = agent_id.to_string();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = controller.runner.run(request) => result,
                _ = cancel.cancelled() => Err(AgentError::Aborted),
            };
            controller.finish_run(&agent_id, run, result);
        });
    }

    fn finish_run(&self, agent_id: &str, run: u64, result: Result<SubagentOutput, AgentError>) {
        let notice = {
            let mut handles = self.handles.lock();
            let Some(handle) = handles.get_mut(agent_id) else {
                return;
            };
            if handle.status == AgentStatus::Closed || handle.run != run {
                debug!("Dropping stale result of subagent {} run {}", agent_id, run);
                return;
            }

            match &result {
                Ok(output) => {
                    handle.transcript.push(Message::assistant(output.text.clone()));
                    info!(
                        "Subagent {} finished run {} ({} steps)",
                        agent_id, run, output.steps
                    );
                }
                Err(err) if err.is_cancellation() => {
                    info!("Subagent {} run {} was cancelled", agent_id, run)
                }
                Err(err) => warn!("Subagent {} run {} failed: {}", agent_id, run, err),
            }
            handle.last_result = Some(RunResult::from_run(&result));
            handle.set_status(AgentStatus::Idle);

            (handle.waiters == 0).then(|| background_notice(agent_id, &handle.report()))
        };

        if let (Some(text), Some(sink)) = (notice, &self.sink) {
            sink.notify(&text);
        }
    }
}

/// Handle for `agent_id`, failing if unknown or closed.
fn open_handle<'a>(
    handles: &'a mut HashMap<String, AgentHandle>,
    agent_id: &str,
) -> Result<&'a mut AgentHandle, SubagentError> {
    let handle = handles
        .get_mut(agent_id)
        .ok_or_else(|| SubagentError::NotFound(agent_id.to_string()))?;
    if handle.status == AgentStatus::Closed {
        return Err(SubagentError::Closed(agent_id.to_string()));
    }
    Ok(handle)
}

/// Returns whether a run was in flight.
fn close_handle(handle: &mut AgentHandle) -> bool {
    let was_running = handle.status == AgentStatus::Running;
    handle.cancel.cancel();
    handle.pending.clear();
    handle.set_status(AgentStatus::Closed);
    was_running
}

fn background_notice(agent_id: &str, report: &HandleReport) -> String {
    let payload = serde_json::json!({
        "agent_id": agent_id,
        "status": report.status,
        "last_result": report.last_result,
        "pending_inputs": report.pending_inputs,
    });
    format!("{}\n{}\n{}", NOTICE_OPEN, payload, NOTICE_CLOSE)
}

/// Marks handles as watched for the lifetime of a `wait` call.
struct WaiterGuard<'a> {
    controller: &'a SubagentController,
    ids: &'a [String],
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut handles = self.controller.handles.lock();
        for id in self.ids {
            if let Some(handle) = handles.get_mut(id) {
                handle.waiters = handle.waiters.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
