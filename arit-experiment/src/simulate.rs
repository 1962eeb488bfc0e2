//! Scripted participant for headless runs.

use std::time::Duration;

use arit_core::TrialState;
use arit_timing::Timer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::ExperimentError;
use crate::instructions::Instruction;
use crate::output::RecordSink;
use crate::state::{ExperimentStateMachine, InputEvent};
use crate::trial::Trial;

/// Independent-race participant: plans a release near the target and
/// withholds on stop trials when the stop process (`ssd + ssrt`) finishes
/// before the planned release.
#[derive(Debug, Clone)]
pub struct SimulatedParticipant {
    /// Half-width of the uniform release noise around the target, seconds.
    pub go_noise: f64,
    pub ssrt: f64,
    /// Chance of sleeping through a trial.
    pub omission_rate: f64,
    rng: StdRng,
    plan: Option<(usize, Option<f64>)>,
}

impl SimulatedParticipant {
    pub fn new(seed: u64) -> Self {
        Self {
            go_noise: 0.06,
            ssrt: 0.22,
            omission_rate: 0.02,
            rng: StdRng::seed_from_u64(seed),
            plan: None,
        }
    }

    /// Seconds after bar onset at which to lift, or `None` to keep holding.
    pub fn plan_release(&mut self, trial: &Trial, target_time: f64) -> Option<f64> {
        if self.rng.random_bool(self.omission_rate) {
            return None;
        }
        let release = target_time + self.rng.random_range(-self.go_noise..=self.go_noise);
        match trial.stop_delay {
            Some(ssd) if ssd + self.ssrt < release => None,
            _ => Some(release),
        }
    }

    fn release_for(&mut self, trial: &Trial, target_time: f64) -> Option<f64> {
        match self.plan {
            Some((position, release)) if position == trial.position => release,
            _ => {
                let release = self.plan_release(trial, target_time);
                debug!(position = trial.position, ?release, "simulated release planned");
                self.plan = Some((trial.position, release));
                release
            }
        }
    }

    /// Chooses this frame's input, if any.
    pub fn respond<T, R, W>(
        &mut self,
        machine: &ExperimentStateMachine<T, R, W>,
    ) -> Option<InputEvent>
    where
        T: Timer,
        R: Rng,
        W: RecordSink,
    {
        if let Some(screen) = machine.current_screen() {
            return Some(match screen {
                Instruction::DoYouUnderstand => InputEvent::Yes,
                _ => InputEvent::Continue,
            });
        }
        let trial = machine.current_trial()?;
        match trial.state {
            TrialState::HoldPrompt | TrialState::TooSoon if !machine.response_held() => {
                Some(InputEvent::ResponseDown)
            }
            TrialState::Filling => {
                let elapsed = machine.filling_elapsed()?;
                let release = self.release_for(trial, machine.config.timing.target_time)?;
                (elapsed >= release && machine.response_held()).then_some(InputEvent::ResponseUp)
            }
            _ => None,
        }
    }
}

/// Runs a whole session with `participant` at the keys, one `frame` per step.
pub fn run_simulation<T, R, W>(
    machine: &mut ExperimentStateMachine<T, R, W>,
    participant: &mut SimulatedParticipant,
    frame: Duration,
) -> Result<(), ExperimentError>
where
    T: Timer,
    R: Rng,
    W: RecordSink,
{
    info!(
        trials = machine.schedule().len(),
        frame_ms = frame.as_secs_f64() * 1e3,
        "simulated session started"
    );
    while !machine.is_finished() {
        if let Some(event) = participant.respond(machine) {
            machine.handle_event(event)?;
        }
        machine.update()?;

        let before = machine.timer.now();
        machine.timer.sleep(frame);
        let interval = machine.timer.elapsed(before);
        machine.timer.record_frame(interval);
    }
    Ok(())
}
