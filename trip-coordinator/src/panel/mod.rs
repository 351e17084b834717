//! The launcher panel that renders driver-facing messages.
//!
//! The host process owns the IPC channel to the panel; this crate only
//! asks it to publish or dismiss a message and checks whether it is ready
//! to receive one.

mod recording;

use std::fmt;

use crate::notify::MessageId;

pub use recording::{PanelCall, RecordingPanel};

/// Connection state of the host panel service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostReadiness {
    ServiceDisconnected,
    ServiceBindingDead,
    NotReadyToProcess,
    ServiceConnected,
    ReadyToProcess,
}

impl HostReadiness {
    /// Returns true if a publish may be attempted at all.
    pub fn can_publish(self) -> bool {
        self == HostReadiness::ReadyToProcess
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostReadiness::ServiceDisconnected => "SERVICE_DISCONNECTED",
            HostReadiness::ServiceBindingDead => "SERVICE_BINDING_DEAD",
            HostReadiness::NotReadyToProcess => "NOT_READY_TO_PROCESS",
            HostReadiness::ServiceConnected => "SERVICE_CONNECTED",
            HostReadiness::ReadyToProcess => "READY_TO_PROCESS",
        }
    }
}

impl fmt::Display for HostReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget channel to the panel.
///
/// Calls must not block; the host queues them to its IPC thread.
pub trait PanelChannel: Send + Sync {
    /// Show `text` as message `id`, auto-dismissed after `auto_dismiss_secs`
    /// (0 = stays until dismissed).
    fn publish(&self, id: MessageId, text: &str, auto_dismiss_secs: u32);

    /// Remove message `id` from the panel.
    fn dismiss(&self, id: MessageId);

    /// Current readiness of the panel service.
    fn readiness(&self) -> HostReadiness;
}
