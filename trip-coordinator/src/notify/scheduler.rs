//! Decides which single message the panel shows.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::config::SchedulerConfig;
use super::message::{LastSentMessage, MessageId, PendingMessage, PriorityTier};
use super::queue::MessageQueue;
use crate::context::HostContext;
use crate::domain::StopId;
use crate::panel::{HostReadiness, PanelChannel};
use crate::prefs::{PreferenceStore, PrefsError, keys};

/// Errors from the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to persist last sent message: {0}")]
    Prefs(#[from] PrefsError),
}

/// Result of [`PriorityNotificationScheduler::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Identical to the unanswered message already on the panel.
    Suppressed,
    Inserted,
    /// Replaced a queued message with the same id.
    Replaced,
}

/// Result of a publish pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(MessageId),
    /// The panel already shows the head of the queue.
    Unchanged,
    /// Nothing eligible to show.
    Idle,
    /// A driver response is being processed.
    Deferred,
    NotReady(HostReadiness),
}

/// Open while a driver response is processed. Dropping it closes the window.
#[derive(Debug)]
pub struct ResponseWindow<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ResponseWindow<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Keeps the pending messages in priority order and mirrors the most urgent
/// eligible one onto the panel.
pub struct PriorityNotificationScheduler<S> {
    queue: MessageQueue,
    last_sent: Mutex<Option<LastSentMessage>>,
    responding: AtomicBool,
    panel: Arc<dyn PanelChannel>,
    prefs: Arc<S>,
    context: Arc<HostContext>,
    config: SchedulerConfig,
}

impl<S: PreferenceStore> PriorityNotificationScheduler<S> {
    pub fn new(
        panel: Arc<dyn PanelChannel>,
        prefs: Arc<S>,
        context: Arc<HostContext>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue: MessageQueue::new(),
            last_sent: Mutex::new(None),
            responding: AtomicBool::new(false),
            panel,
            prefs,
            context,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.queue.contains(id)
    }

    /// The message currently believed to be on the panel.
    pub async fn last_sent(&self) -> Option<LastSentMessage> {
        self.last_sent.lock().await.clone()
    }

    /// Dismiss a message left on the panel by a previous process.
    pub async fn restore(&self) -> Result<(), SchedulerError> {
        if self.last_sent.lock().await.is_some() {
            return Ok(());
        }
        let persisted = self.persisted_last_sent().await?;
        if !persisted.is_none() {
            debug!(message = %persisted, "dismissing orphaned panel message");
            self.panel.dismiss(persisted);
            self.prefs.remove(keys::LAST_SENT_MESSAGE_ID).await?;
        }
        Ok(())
    }

    /// Queue a message and run a publish pass.
    pub async fn enqueue(&self, msg: PendingMessage) -> Result<EnqueueOutcome, SchedulerError> {
        {
            let last = self.last_sent.lock().await;
            if let Some(shown) = last.as_ref()
                && shown.text == msg.text
                && !shown.responded
            {
                trace!(message = %msg.id, "suppressing duplicate of displayed message");
                return Ok(EnqueueOutcome::Suppressed);
            }
        }

        let id = msg.id;
        let outcome = if self.queue.push(msg) {
            EnqueueOutcome::Replaced
        } else {
            EnqueueOutcome::Inserted
        };
        debug!(message = %id, ?outcome, queued = self.queue.len(), "enqueued message");

        self.publish_next().await?;
        Ok(outcome)
    }

    /// The message that should be on the panel now, if any.
    pub async fn select_next(&self) -> Option<PendingMessage> {
        let last = self.last_sent.lock().await;
        self.select(last.as_ref())
    }

    fn select(&self, shown: Option<&LastSentMessage>) -> Option<PendingMessage> {
        let head = self.queue.peek()?;
        // The dispatch screen already shows stop details
        if self.context.is_dispatch_ui_visible() && !head.tier.is_high_priority() {
            trace!(head = %head.id, "dispatch screen visible, holding back low priority message");
            return None;
        }
        if let Some(shown) = shown
            && !shown.responded
            && shown.tier.is_high_priority()
            && head.id != shown.id
            && head.tier > shown.tier
        {
            trace!(
                displayed = %shown.id,
                head = %head.id,
                "high priority message displayed, holding back head"
            );
            return None;
        }
        Some(head)
    }

    /// Put the selected message on the panel, replacing whatever is shown.
    pub async fn publish_next(&self) -> Result<PublishOutcome, SchedulerError> {
        if self.responding.load(Ordering::Acquire) {
            return Ok(PublishOutcome::Deferred);
        }
        let readiness = self.panel.readiness();
        if !readiness.can_publish() {
            debug!(%readiness, "panel not ready, not publishing");
            return Ok(PublishOutcome::NotReady(readiness));
        }

        let mut last = self.last_sent.lock().await;
        let Some(next) = self.select(last.as_ref()) else {
            return Ok(PublishOutcome::Idle);
        };
        if let Some(shown) = last.as_ref()
            && shown.id == next.id
            && shown.text == next.text
            && !shown.responded
        {
            return Ok(PublishOutcome::Unchanged);
        }

        if let Some(shown) = last.take() {
            self.panel.dismiss(shown.id);
        }
        self.panel
            .publish(next.id, &next.text, self.config.auto_dismiss_secs(next.tier));
        *last = Some(LastSentMessage::from(&next));
        self.prefs
            .set(keys::LAST_SENT_MESSAGE_ID, next.id.to_string())
            .await?;

        debug!(message = %next.id, tier = %next.tier, "published message");
        Ok(PublishOutcome::Published(next.id))
    }

    /// Remove every queued message with this id. Returns how many were removed.
    pub fn remove_by_id(&self, id: MessageId) -> usize {
        self.queue.drain_matching(|m| m.id == id).len()
    }

    /// Drop queued arrival prompts for these stops, dismissing the displayed
    /// one if it was among them.
    pub async fn invalidate_by_stop_id(&self, stops: &[StopId]) -> Result<usize, SchedulerError> {
        let stops: HashSet<StopId> = stops.iter().copied().collect();
        let removed = self.queue.drain_matching(|m| {
            m.tier == PriorityTier::DID_YOU_ARRIVE && m.stop_id.is_some_and(|s| stops.contains(&s))
        });
        if removed.is_empty() {
            return Ok(0);
        }

        let shown = self.last_sent.lock().await.as_ref().map(|s| s.id);
        if let Some(shown) = shown
            && removed.iter().any(|m| m.id == shown)
        {
            self.dismiss(shown).await?;
        }
        debug!(removed = removed.len(), "invalidated arrival prompts");
        Ok(removed.len())
    }

    /// Dismiss `id`, reconciling with the id persisted by the last publish.
    ///
    /// Returns the ids actually dismissed on the panel.
    pub async fn dismiss(&self, id: MessageId) -> Result<Vec<MessageId>, SchedulerError> {
        let persisted = self.persisted_last_sent().await?;
        let targets: Vec<MessageId> = if id == persisted {
            vec![id]
        } else {
            vec![id, persisted]
        }
        .into_iter()
        .filter(|m| !m.is_none())
        .collect();

        if targets.is_empty() {
            return Ok(targets);
        }
        for target in &targets {
            self.panel.dismiss(*target);
        }

        let mut last = self.last_sent.lock().await;
        if last.as_ref().is_some_and(|s| targets.contains(&s.id)) {
            *last = None;
        }
        drop(last);
        self.prefs.remove(keys::LAST_SENT_MESSAGE_ID).await?;

        debug!(?targets, "dismissed panel messages");
        Ok(targets)
    }

    /// Dismiss whatever is currently displayed.
    pub async fn dismiss_current(&self) -> Result<Vec<MessageId>, SchedulerError> {
        let shown = self
            .last_sent
            .lock()
            .await
            .as_ref()
            .map_or(MessageId::NONE, |s| s.id);
        self.dismiss(shown).await
    }

    /// The stop an arrival prompt asks about.
    ///
    /// Looks `id` up on the panel first, then in the queue. Returns `None`
    /// unless it is a "did you arrive" prompt tied to a stop.
    pub async fn arrival_prompt_stop(&self, id: MessageId) -> Option<StopId> {
        let shown = self
            .last_sent
            .lock()
            .await
            .as_ref()
            .filter(|s| s.id == id)
            .map(|s| (s.tier, s.stop_id));
        let (tier, stop) = match shown {
            Some(found) => found,
            None => self.queue.get(id).map(|m| (m.tier, m.stop_id))?,
        };
        if tier != PriorityTier::DID_YOU_ARRIVE {
            return None;
        }
        stop
    }

    /// Record that the driver answered the displayed message.
    pub async fn mark_responded(&self, id: MessageId) -> bool {
        let mut last = self.last_sent.lock().await;
        match last.as_mut() {
            Some(shown) if shown.id == id => {
                shown.responded = true;
                true
            }
            _ => false,
        }
    }

    /// Open the response window, or `None` if one is already open.
    ///
    /// No message is published while the window is open.
    pub fn begin_response(&self) -> Option<ResponseWindow<'_>> {
        self.responding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ResponseWindow {
                flag: &self.responding,
            })
    }

    /// Returns true if no driver response is being processed.
    pub fn is_safe_to_respond(&self) -> bool {
        !self.responding.load(Ordering::Acquire)
    }

    async fn persisted_last_sent(&self) -> Result<MessageId, SchedulerError> {
        Ok(self
            .prefs
            .get(keys::LAST_SENT_MESSAGE_ID)
            .await?
            .map_or(MessageId::NONE, |raw| MessageId::parse_or_none(&raw)))
    }
}
