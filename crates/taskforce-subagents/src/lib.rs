//! Subagent lifecycle control for taskforce.
//!
//! A [`SubagentController`] owns a bounded set of child agent handles. Each
//! handle wraps one concurrently running agent whose runs are executed by an
//! injected [`SubagentRunner`]. The controller is driven through five model
//! tools:
//!
//! - `spawn_agent` - create a handle and start its first run
//! - `send_input` - feed a handle; queued while a run is in flight
//! - `resume_agent` - start a run from the oldest queued input
//! - `wait` - block until a handle leaves `running` or a timeout fires
//! - `close_agent` - cancel and close a handle
//!
//! Completions nobody is waiting for are reported through a
//! [`BackgroundSink`].

mod config;
mod controller;
mod error;
mod input;
mod runner;
mod tools;

pub use config::ResolvedSubagentConfig;
pub use controller::{
    AgentStatus, AgentSummary, CloseOutcome, HandleReport, NOTICE_CLOSE, NOTICE_OPEN, RunResult,
    SendOutcome, SpawnOptions, SpawnOutcome, SubagentController, WaitOutcome,
};
pub use error::SubagentError;
pub use input::parse_turn;
pub use runner::{BackgroundSink, SubagentOutput, SubagentRequest, SubagentRunner};
pub use tools::*;
