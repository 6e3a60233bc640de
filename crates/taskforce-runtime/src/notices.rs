//! Background notices addressed to one agent.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use taskforce_subagents::BackgroundSink;

/// Collects completion notices about the children of a single agent run.
///
/// The tool loop drains it between turns. An optional outer sink sees
/// every notice as well.
#[derive(Default)]
pub struct NoticeInbox {
    notices: Mutex<VecDeque<String>>,
    forward: Option<Arc<dyn BackgroundSink>>,
}

impl NoticeInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding_to(sink: Arc<dyn BackgroundSink>) -> Self {
        Self {
            notices: Mutex::new(VecDeque::new()),
            forward: Some(sink),
        }
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.notices.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().is_empty()
    }
}

impl BackgroundSink for NoticeInbox {
    fn notify(&self, text: &str) {
        self.notices.lock().push_back(text.to_string());
        if let Some(forward) = &self.forward {
            forward.notify(text);
        }
    }
}
