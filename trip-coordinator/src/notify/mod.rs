//! Priority notification scheduling for the driver panel.
//!
//! Messages wait in a [`MessageQueue`] ordered by tier, distance and id.
//! The [`PriorityNotificationScheduler`] keeps exactly one of them on the
//! panel and remembers which, so a restart can clean up after itself.

mod config;
mod message;
mod queue;
mod scheduler;

pub use config::SchedulerConfig;
pub use message::{LastSentMessage, MessageId, PendingMessage, PriorityTier};
pub use queue::MessageQueue;
pub use scheduler::{
    EnqueueOutcome, PriorityNotificationScheduler, PublishOutcome, ResponseWindow, SchedulerError,
};
