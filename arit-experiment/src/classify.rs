use arit_core::{OutcomeCategory, Proximity, Signal, TimingAnomaly, TrialOutcome};

/// Go releases at or before this many seconds after bar onset are "almost" responses.
pub const ALMOST_GO_LIMIT: f64 = 0.100;

/// Raw timing of one finished trial, as reported by the input layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialTiming {
    pub signal: Signal,
    pub released: bool,
    /// Seconds from bar onset.
    pub release_time: Option<f64>,
    pub effective_stop_delay: Option<f64>,
    pub target_time: f64,
    pub trial_length: f64,
}

/// Derives the outcome category of a finished trial.
pub fn classify(timing: &TrialTiming) -> Result<TrialOutcome, TimingAnomaly> {
    let release_time = match (timing.released, timing.release_time) {
        (true, None) => return Err(TimingAnomaly::MissingReleaseTime),
        (false, Some(t)) => return Err(TimingAnomaly::UnexpectedReleaseTime(t)),
        (true, Some(t)) if t < 0.0 => return Err(TimingAnomaly::NegativeReleaseTime(t)),
        (true, Some(t)) if t > timing.trial_length => {
            return Err(TimingAnomaly::ReleaseAfterWindow {
                release_time: t,
                trial_length: timing.trial_length,
            })
        }
        (_, t) => t,
    };

    let (category, proximity, effective_stop_delay) = match (timing.signal, release_time) {
        (Signal::Go, None) => (OutcomeCategory::Omission, None, None),
        (Signal::Go, Some(t)) => {
            let category = if t <= ALMOST_GO_LIMIT {
                OutcomeCategory::AlmostGo
            } else {
                OutcomeCategory::CorrectGo
            };
            let proximity = Proximity::from_release(t, timing.target_time);
            (category, Some(proximity), None)
        }
        (Signal::Stop, None) => (
            OutcomeCategory::CorrectStop,
            None,
            timing.effective_stop_delay,
        ),
        (Signal::Stop, Some(_)) => (
            OutcomeCategory::IncorrectStop,
            None,
            timing.effective_stop_delay,
        ),
    };

    Ok(TrialOutcome {
        signal: timing.signal,
        category,
        response_lifted: release_time.is_some(),
        reaction_time: release_time,
        effective_stop_delay,
        proximity,
    })
}
