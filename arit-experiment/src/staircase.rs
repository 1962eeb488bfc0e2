use arit_core::{ConfigError, TrialOutcome, TrialSpec};
use tracing::debug;

/// Inclusive SSD range and step, in seconds. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaircaseBounds {
    lower: f64,
    upper: f64,
    step: f64,
}

impl StaircaseBounds {
    pub fn new(lower: f64, upper: f64, step: f64) -> Result<Self, ConfigError> {
        if !(step > 0.0) {
            return Err(ConfigError::NonPositiveStep(step));
        }
        if !(lower <= upper) {
            return Err(ConfigError::InvalidBounds { lower, upper });
        }
        Ok(Self { lower, upper, step })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Exact containment. Sub-millisecond overshoot counts as outside.
    pub fn contains(&self, delay: f64) -> bool {
        self.lower <= delay && delay <= self.upper
    }
}

/// Direction of one staircase adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaircaseStep {
    Up,
    Down,
    Hold,
}

impl StaircaseStep {
    /// Step implied by the previous trial. Only stop trials move the
    /// staircase: withholding (including an omission) makes the next stop
    /// harder, releasing makes it easier.
    pub fn after(previous: Option<&TrialOutcome>) -> Self {
        match previous {
            Some(outcome) if outcome.signal.is_stop() => {
                if outcome.category.withheld() {
                    StaircaseStep::Up
                } else {
                    StaircaseStep::Down
                }
            }
            _ => StaircaseStep::Hold,
        }
    }
}

/// Next stop-signal delay given the previous stop trial's outcome.
///
/// Bounds are compared at millisecond resolution so accumulated float error
/// can never push the delay past a bound, and the result is clamped.
pub fn next_delay(previous: Option<&TrialOutcome>, current: f64, bounds: &StaircaseBounds) -> f64 {
    let next = match StaircaseStep::after(previous) {
        StaircaseStep::Up if round_ms(current) < round_ms(bounds.upper) => {
            (current + bounds.step).min(bounds.upper)
        }
        StaircaseStep::Up => bounds.upper,
        StaircaseStep::Down if round_ms(current) > round_ms(bounds.lower) => {
            (current - bounds.step).max(bounds.lower)
        }
        StaircaseStep::Down => bounds.lower,
        StaircaseStep::Hold => current,
    };
    snap_ns(next)
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

// Keeps delays on a nanosecond grid so repeated steps print cleanly.
fn snap_ns(seconds: f64) -> f64 {
    (seconds * 1e9).round() / 1e9
}

/// Run-scoped adaptive SSD state
#[derive(Debug, Clone, PartialEq)]
pub struct StaircaseState {
    current: f64,
    initial: f64,
    bounds: StaircaseBounds,
    /// Outcome of the latest stop trial not yet folded into `current`.
    pending: Option<TrialOutcome>,
}

impl StaircaseState {
    pub fn new(initial: f64, bounds: StaircaseBounds) -> Result<Self, ConfigError> {
        if !bounds.contains(initial) {
            return Err(ConfigError::InitialDelayOutOfBounds {
                initial,
                lower: bounds.lower,
                upper: bounds.upper,
            });
        }
        Ok(Self {
            current: initial,
            initial,
            bounds,
            pending: None,
        })
    }

    pub fn current_delay(&self) -> f64 {
        self.current
    }

    pub fn bounds(&self) -> &StaircaseBounds {
        &self.bounds
    }

    /// Applies the pending stop outcome, if any, and returns the delay for
    /// the stop trial about to start.
    pub fn next_delay(&mut self) -> f64 {
        let previous = self.pending.take();
        let next = next_delay(previous.as_ref(), self.current, &self.bounds);
        if next != self.current {
            debug!(from = self.current, to = next, "SSD adjusted");
        }
        self.current = next;
        next
    }

    /// Remembers a stop trial's outcome for the next adjustment. Go trials
    /// are ignored.
    pub fn record(&mut self, outcome: &TrialOutcome) {
        if outcome.signal.is_stop() {
            self.pending = Some(*outcome);
        }
    }

    /// Forgets the pending outcome; the next stop trial keeps the current delay.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.pending = None;
    }
}

/// How each stop trial gets its delay. Chosen once per run.
#[derive(Debug, Clone, PartialEq)]
pub enum SsdController {
    Adaptive(StaircaseState),
    Fixed,
}

impl SsdController {
    /// SSD for the trial about to start; `None` for go trials.
    pub fn delay_for(&mut self, spec: &TrialSpec) -> Option<f64> {
        if !spec.signal.is_stop() {
            return None;
        }
        match self {
            SsdController::Adaptive(state) => Some(state.next_delay()),
            SsdController::Fixed => spec.fixed_stop_delay,
        }
    }

    pub fn record(&mut self, outcome: &TrialOutcome) {
        if let SsdController::Adaptive(state) = self {
            state.record(outcome);
        }
    }

    pub fn discard_pending(&mut self) {
        if let SsdController::Adaptive(state) = self {
            state.discard_pending();
        }
    }

    pub fn reset(&mut self) {
        if let SsdController::Adaptive(state) = self {
            state.reset();
        }
    }

    pub fn current_delay(&self) -> Option<f64> {
        match self {
            SsdController::Adaptive(state) => Some(state.current_delay()),
            SsdController::Fixed => None,
        }
    }
}
