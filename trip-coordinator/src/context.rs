//! State owned by the host process that background work consults.

use std::sync::atomic::{AtomicBool, Ordering};

/// Flags the host updates as its UI changes.
///
/// Shared behind an `Arc` between the host, the coordinator and the route
/// retry loop.
#[derive(Debug, Default)]
pub struct HostContext {
    dispatch_ui_visible: AtomicBool,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether the dispatch screen is in the foreground.
    pub fn set_dispatch_ui_visible(&self, visible: bool) {
        self.dispatch_ui_visible.store(visible, Ordering::Release);
    }

    pub fn is_dispatch_ui_visible(&self) -> bool {
        self.dispatch_ui_visible.load(Ordering::Acquire)
    }
}
