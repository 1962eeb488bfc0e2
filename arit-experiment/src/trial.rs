use arit_core::{TrialOutcome, TrialState};

use crate::schedule::ScheduledTrial;

/// The trial currently on screen
#[derive(Debug, Clone)]
pub struct Trial {
    /// Position in the schedule.
    pub position: usize,
    pub scheduled: ScheduledTrial,
    /// SSD for stop trials, `None` for go trials.
    pub stop_delay: Option<f64>,
    /// Pre-trial wait drawn for this attempt, seconds.
    pub jitter: f64,
    pub timestamps: TrialTimestamps,
    pub state: TrialState,
    pub outcome: Option<TrialOutcome>,
    /// Bar height in cm once the trial has resolved.
    pub final_fill_cm: f64,
}

impl Trial {
    /// Time at which the bar stops climbing. Go trials never stop early.
    pub fn bar_stop_time(&self, trial_length: f64) -> f64 {
        self.stop_delay.unwrap_or(trial_length)
    }
}

/// Nanosecond timestamps from the session timer
#[derive(Debug, Clone, Default)]
pub struct TrialTimestamps {
    pub state_entered: u64,
    pub filling_start: Option<u64>,
    pub release: Option<u64>,
}

/// A finished trial as kept for the session summary
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTrial {
    pub scheduled: ScheduledTrial,
    pub outcome: TrialOutcome,
}
