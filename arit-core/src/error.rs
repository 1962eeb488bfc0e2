use thiserror::Error;

/// Rejected task configuration. Raised once at startup, never mid-run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("lowest SSD {lower}s is above highest SSD {upper}s")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("SSD step size must be positive (got {0}s)")]
    NonPositiveStep(f64),
    #[error("initial SSD {initial}s lies outside [{lower}s, {upper}s]")]
    InitialDelayOutOfBounds { initial: f64, lower: f64, upper: f64 },
    #[error("unknown SSD method '{0}'; expected 'staircase' or 'fixed'")]
    UnknownMethod(String),
    #[error("unknown trial order '{0}'; expected 'random' or 'sequential'")]
    UnknownOrder(String),
    #[error("unknown output format '{0}'; expected 'tsv' or 'csv'")]
    UnknownOutputFormat(String),
    #[error("unknown signal code {0}; expected 0 (go) or 1 (stop)")]
    UnknownSignal(u8),
    #[error("trial length must be positive (got {0}s)")]
    NonPositiveTrialLength(f64),
    #[error("target time {target}s must lie inside the trial (0, {trial_length}s]")]
    TargetOutsideTrial { target: f64, trial_length: f64 },
    #[error("{field} must not be negative (got {value}s)")]
    NegativeDuration { field: &'static str, value: f64 },
    #[error("pre-trial jitter range is empty")]
    EmptyJitterRange,
    #[error("stop trial at row {row} of {table} has no fixed stop time")]
    MissingFixedDelay { table: String, row: usize },
    #[error("fixed stop time {value}s at row {row} of {table} must lie in [0, {trial_length}s)")]
    InvalidFixedDelay {
        table: String,
        row: usize,
        value: f64,
        trial_length: f64,
    },
    #[error("highest SSD {upper}s must be shorter than the {trial_length}s trial")]
    StopDelayOutsideTrial { upper: f64, trial_length: f64 },
    #[error("test mixed block must be repeated at least once")]
    NoTestBlocks,
}

/// Release timing that cannot have come from a well-behaved input layer.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimingAnomaly {
    #[error("release reported {0}s before trial start")]
    NegativeReleaseTime(f64),
    #[error("release at {release_time}s falls outside the {trial_length}s trial window")]
    ReleaseAfterWindow { release_time: f64, trial_length: f64 },
    #[error("key reported released without a release time")]
    MissingReleaseTime,
    #[error("release time {0}s reported for a trial without a release")]
    UnexpectedReleaseTime(f64),
}
