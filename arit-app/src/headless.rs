use std::time::Duration;

use anyhow::Result;
use arit_experiment::{run_simulation, ExperimentStateMachine, SimulatedParticipant};
use arit_timing::{HighPrecisionTimer, ManualTimer, Timer};
use tracing::info;

use crate::{finish_session, Session};

const FRAME: Duration = Duration::from_nanos(16_666_667);

pub fn run(session: Session, seed: u64, realtime: bool) -> Result<()> {
    if realtime {
        run_with(session, HighPrecisionTimer::new(), seed)
    } else {
        run_with(session, ManualTimer::new(), seed)
    }
}

fn run_with<T: Timer>(session: Session, timer: T, seed: u64) -> Result<()> {
    let Session {
        config,
        schedule,
        rng,
        writer,
        summary_path,
    } = session;
    info!(path = %writer.path().display(), "simulating participant");

    let mut machine = ExperimentStateMachine::new(config, schedule, timer, rng, writer);
    let mut participant = SimulatedParticipant::new(seed);
    run_simulation(&mut machine, &mut participant, FRAME)?;

    finish_session(&machine.summary(), &summary_path)
}
