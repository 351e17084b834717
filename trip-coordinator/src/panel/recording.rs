//! Panel that records calls instead of rendering them.

use std::sync::{Arc, Mutex, PoisonError};

use crate::notify::MessageId;

use super::{HostReadiness, PanelChannel};

/// A call made to a [`RecordingPanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCall {
    Publish {
        id: MessageId,
        text: String,
        auto_dismiss_secs: u32,
    },
    Dismiss(MessageId),
}

#[derive(Debug)]
struct Inner {
    calls: Vec<PanelCall>,
    readiness: HostReadiness,
}

/// Panel channel that keeps a log of every call.
///
/// Useful for tests and for running the coordinator without a host.
/// Clones share the same log.
#[derive(Debug, Clone)]
pub struct RecordingPanel {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RecordingPanel {
    fn default() -> Self {
        Self::new(HostReadiness::ReadyToProcess)
    }
}

impl RecordingPanel {
    pub fn new(readiness: HostReadiness) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                calls: Vec::new(),
                readiness,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_readiness(&self, readiness: HostReadiness) {
        self.lock().readiness = readiness;
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<PanelCall> {
        self.lock().calls.clone()
    }

    /// Ids of published messages, oldest first.
    pub fn published(&self) -> Vec<MessageId> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                PanelCall::Publish { id, .. } => Some(*id),
                PanelCall::Dismiss(_) => None,
            })
            .collect()
    }

    /// Text of the most recently published message.
    pub fn last_published_text(&self) -> Option<String> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            PanelCall::Publish { text, .. } => Some(text.clone()),
            PanelCall::Dismiss(_) => None,
        })
    }

    /// Ids of dismissed messages, oldest first.
    pub fn dismissed(&self) -> Vec<MessageId> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                PanelCall::Dismiss(id) => Some(*id),
                PanelCall::Publish { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }
}

impl PanelChannel for RecordingPanel {
    fn publish(&self, id: MessageId, text: &str, auto_dismiss_secs: u32) {
        self.lock().calls.push(PanelCall::Publish {
            id,
            text: text.to_string(),
            auto_dismiss_secs,
        });
    }

    fn dismiss(&self, id: MessageId) {
        self.lock().calls.push(PanelCall::Dismiss(id));
    }

    fn readiness(&self) -> HostReadiness {
        self.lock().readiness
    }
}
