//! Scheduler configuration.

use super::message::PriorityTier;

/// How long each kind of message stays on the panel, and prompt wording.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Auto-dismiss for "did you arrive" prompts (seconds, 0 = until answered).
    pub arrival_prompt_secs: u32,

    /// Auto-dismiss for "complete form" prompts.
    pub complete_form_secs: u32,

    /// Auto-dismiss for "select stop" prompts.
    pub select_stop_secs: u32,

    /// Auto-dismiss for everything less urgent, including next-stop addresses.
    pub default_secs: u32,

    /// Arrival prompt text. `{stop}` is replaced with the stop name.
    pub arrival_prompt_template: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            arrival_prompt_secs: 0,
            complete_form_secs: 0,
            select_stop_secs: 60,
            default_secs: 30,
            arrival_prompt_template: "Did you arrive at {stop}?".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Set the arrival prompt wording.
    pub fn with_arrival_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.arrival_prompt_template = template.into();
        self
    }

    /// Set the auto-dismiss used for low-priority messages.
    pub fn with_default_secs(mut self, secs: u32) -> Self {
        self.default_secs = secs;
        self
    }

    /// Auto-dismiss seconds for a message of the given tier.
    pub fn auto_dismiss_secs(&self, tier: PriorityTier) -> u32 {
        match tier {
            PriorityTier::DID_YOU_ARRIVE => self.arrival_prompt_secs,
            PriorityTier::COMPLETE_FORM => self.complete_form_secs,
            PriorityTier::SELECT_STOP => self.select_stop_secs,
            _ => self.default_secs,
        }
    }

    /// Render the arrival prompt for a stop.
    pub fn arrival_prompt_text(&self, stop_name: &str) -> String {
        self.arrival_prompt_template.replace("{stop}", stop_name)
    }
}
