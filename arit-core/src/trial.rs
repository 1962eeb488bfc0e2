use serde::{Deserialize, Serialize, Serializer};

use crate::outcome::{OutcomeCategory, Proximity};
use crate::signal::Signal;

/// One row of a condition table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub signal: Signal,
    /// Seconds; consulted only under the fixed SSD method.
    pub fixed_stop_delay: Option<f64>,
}

impl TrialSpec {
    pub fn go() -> Self {
        Self {
            signal: Signal::Go,
            fixed_stop_delay: None,
        }
    }

    pub fn stop(fixed_stop_delay: Option<f64>) -> Self {
        Self {
            signal: Signal::Stop,
            fixed_stop_delay,
        }
    }
}

/// Trial state machine states
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialState {
    /// Waiting for the response key to go down.
    HoldPrompt,
    /// Optional three-second countdown with the key held.
    Countdown,
    /// Key was lifted before the bar started; waiting for it to go down again.
    TooSoon,
    /// Random pre-trial wait with the key held.
    Jitter,
    /// Bar is rising; waiting for release or timeout.
    Filling,
    Feedback,
    Complete,
}

/// Classified result of one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub signal: Signal,
    pub category: OutcomeCategory,
    pub response_lifted: bool,
    /// Seconds from bar onset to release.
    pub reaction_time: Option<f64>,
    /// SSD in force for a stop trial.
    pub effective_stop_delay: Option<f64>,
    /// Go releases only.
    pub proximity: Option<Proximity>,
}

/// Flat per-trial output row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub id: String,
    pub block: usize,
    #[serde(rename = "trialType")]
    pub trial_type: String,
    pub trial: usize,
    pub signal: u8,
    pub response: u8,
    pub correct: i8,
    pub outcome: OutcomeCategory,
    #[serde(serialize_with = "nan_if_none")]
    pub ssd: Option<f64>,
    #[serde(serialize_with = "nan_if_none")]
    pub rt: Option<f64>,
}

impl TrialRecord {
    pub const HEADER: [&'static str; 10] = [
        "id",
        "block",
        "trialType",
        "trial",
        "signal",
        "response",
        "correct",
        "outcome",
        "ssd",
        "rt",
    ];

    pub fn new(
        participant_id: &str,
        block: usize,
        trial_type: &str,
        trial: usize,
        outcome: &TrialOutcome,
    ) -> Self {
        Self {
            id: participant_id.to_string(),
            block,
            trial_type: trial_type.to_string(),
            trial,
            signal: outcome.signal.code(),
            response: u8::from(outcome.response_lifted),
            correct: outcome.category.legacy_code(),
            outcome: outcome.category,
            ssd: outcome.effective_stop_delay,
            rt: outcome.reaction_time,
        }
    }
}

fn nan_if_none<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_str("NaN"),
    }
}
