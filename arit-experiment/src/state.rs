use std::collections::VecDeque;

use arit_core::{
    bar_height, BarScene, BlockKind, OutcomeCategory, Scene, SessionPhase, TrialOutcome,
    TrialRecord, TrialState,
};
use arit_timing::{seconds_between, Timer};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::classify::{classify, TrialTiming};
use crate::config::{Palette, ValidatedConfig};
use crate::error::ExperimentError;
use crate::instructions::Instruction;
use crate::output::RecordSink;
use crate::schedule::{Schedule, ScheduledTrial};
use crate::staircase::SsdController;
use crate::summary::SessionSummary;
use crate::trial::{CompletedTrial, Trial, TrialTimestamps};

/// Participant input, already mapped from raw key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ResponseDown,
    ResponseUp,
    Yes,
    No,
    /// Any other key.
    Continue,
    Abort,
}

/// Drives a whole session. `update` runs once per frame and key events come
/// in through `handle_event`; neither ever blocks.
pub struct ExperimentStateMachine<T, R, W>
where
    T: Timer,
    R: Rng,
    W: RecordSink,
{
    pub phase: SessionPhase,
    pub timer: T,
    pub rng: R,
    pub config: ValidatedConfig,
    controller: SsdController,
    schedule: Schedule,
    cursor: usize,
    screens: VecDeque<Instruction>,
    screen_shown_at: u64,
    current: Option<Trial>,
    response_held: bool,
    results: Vec<CompletedTrial>,
    sink: W,
    anomalies: usize,
    aborted: bool,
    finished: bool,
}

impl<T, R, W> ExperimentStateMachine<T, R, W>
where
    T: Timer,
    R: Rng,
    W: RecordSink,
{
    pub fn new(config: ValidatedConfig, schedule: Schedule, timer: T, rng: R, sink: W) -> Self {
        let controller = config.controller();
        let now = timer.now();
        Self {
            phase: SessionPhase::default(),
            timer,
            rng,
            config,
            controller,
            schedule,
            cursor: 0,
            screens: VecDeque::from([Instruction::Welcome]),
            screen_shown_at: now,
            current: None,
            response_held: false,
            results: Vec::new(),
            sink,
            anomalies: 0,
            aborted: false,
            finished: false,
        }
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Result<(), ExperimentError> {
        match event {
            InputEvent::ResponseDown => self.response_held = true,
            InputEvent::ResponseUp => self.response_held = false,
            InputEvent::Abort => {
                self.abort();
                return Ok(());
            }
            _ => {}
        }
        if self.finished {
            return Ok(());
        }

        if let Some(screen) = self.screens.front().copied() {
            self.answer_screen(screen, event);
            return Ok(());
        }

        if event == InputEvent::ResponseUp {
            self.response_lifted()?;
        }
        Ok(())
    }

    /// Per-frame callback: advances timed trial states.
    pub fn update(&mut self) -> Result<(), ExperimentError> {
        if self.finished || !self.screens.is_empty() {
            return Ok(());
        }
        let now = self.timer.now();
        let timing = &self.config.timing;
        let count_down = self.config.count_down;

        let Some(trial) = self.current.as_mut() else {
            return Ok(());
        };
        let in_state = seconds_between(trial.timestamps.state_entered, now);
        let state = trial.state;

        match state {
            TrialState::HoldPrompt | TrialState::TooSoon if self.response_held => {
                let next = if count_down {
                    TrialState::Countdown
                } else {
                    TrialState::Jitter
                };
                enter(trial, next, now);
            }
            TrialState::Countdown if in_state >= timing.countdown => {
                enter(trial, TrialState::Jitter, now);
            }
            TrialState::Jitter if in_state >= trial.jitter => {
                enter(trial, TrialState::Filling, now);
                trial.timestamps.filling_start = Some(now);
                self.timer.clear_frames();
            }
            TrialState::Filling if in_state >= timing.trial_length => {
                self.finish_trial(None)?;
            }
            TrialState::Feedback if in_state >= timing.inter_trial_interval => {
                enter(trial, TrialState::Complete, now);
            }
            TrialState::Complete => self.advance(),
            _ => {}
        }
        Ok(())
    }

    /// What should be on screen right now.
    pub fn scene(&self) -> Scene {
        let key = &self.config.presentation.response_key;
        if let Some(screen) = self.screens.front() {
            return Scene::message(screen.text(key));
        }
        let Some(trial) = self.current.as_ref() else {
            return Scene::default();
        };

        let now = self.timer.now();
        let in_state = seconds_between(trial.timestamps.state_entered, now);
        let mut scene = Scene {
            message: None,
            bar: Some(self.bar_scene(0.0, Palette::NEUTRAL)),
            countdown: None,
        };
        match trial.state {
            TrialState::HoldPrompt => scene.message = Some(Instruction::PressHold.text(key)),
            TrialState::TooSoon => scene.message = Some(Instruction::TooSoon.text(key)),
            TrialState::Countdown => {
                let left = (self.config.timing.countdown - in_state).ceil().max(1.0);
                scene.countdown = Some(left as u32);
            }
            TrialState::Jitter => {}
            TrialState::Filling => {
                let trial_length = self.config.timing.trial_length;
                let fill = bar_height(
                    in_state,
                    trial.bar_stop_time(trial_length),
                    self.config.presentation.bar_height_cm,
                    trial_length,
                );
                scene.bar = Some(self.bar_scene(fill, Palette::NEUTRAL));
            }
            TrialState::Feedback | TrialState::Complete => {
                let color = match (self.config.trial_feedback, trial.outcome.as_ref()) {
                    (true, Some(outcome)) => {
                        scene.message =
                            Some(Instruction::Feedback(outcome.category).text(key));
                        self.arrow_color(outcome)
                    }
                    _ => Palette::NEUTRAL,
                };
                scene.bar = Some(self.bar_scene(trial.final_fill_cm, color));
            }
        }
        scene
    }

    fn bar_scene(&self, fill_cm: f64, arrow_color: [u8; 4]) -> BarScene {
        let presentation = &self.config.presentation;
        BarScene {
            bar_height_cm: presentation.bar_height_cm,
            bar_width_cm: presentation.bar_width_cm,
            fill_cm,
            target_cm: presentation.target_cm,
            arrow_color,
        }
    }

    fn arrow_color(&self, outcome: &TrialOutcome) -> [u8; 4] {
        let palette = &self.config.presentation.palette;
        match (outcome.category, outcome.proximity) {
            (_, Some(proximity)) => palette.get(proximity.palette_index()),
            (OutcomeCategory::CorrectStop, _) => palette.best(),
            _ => palette.worst(),
        }
    }

    fn answer_screen(&mut self, screen: Instruction, event: InputEvent) {
        match (screen, event) {
            (_, InputEvent::ResponseUp) => {}
            (Instruction::DoYouUnderstand, InputEvent::Yes) => self.next_screen(),
            (Instruction::DoYouUnderstand, InputEvent::No) => {
                info!("participant did not understand the task, ending session");
                self.end_session();
            }
            (Instruction::DoYouUnderstand, _) => {}
            (Instruction::BlockComplete { .. }, _) => {
                let waited = seconds_between(self.screen_shown_at, self.timer.now());
                if waited >= self.config.timing.block_break_min {
                    self.next_screen();
                }
            }
            (Instruction::End, _) => {
                self.screens.clear();
                self.finished = true;
            }
            _ => self.next_screen(),
        }
    }

    fn next_screen(&mut self) {
        self.screens.pop_front();
        self.screen_shown_at = self.timer.now();
        if !self.screens.is_empty() {
            return;
        }
        match self.phase {
            SessionPhase::Welcome | SessionPhase::GoInstructions => self.advance_phase(),
            SessionPhase::Blocks => self.start_trial(),
            SessionPhase::End => self.finished = true,
        }
    }

    fn advance_phase(&mut self) {
        let Some(next) = self.phase.next() else {
            return;
        };
        self.phase = next;
        match next {
            SessionPhase::GoInstructions => self.screens.push_back(Instruction::GoInstructions),
            SessionPhase::Blocks => {
                info!(trials = self.schedule.len(), "starting trial blocks");
                self.begin_position();
            }
            _ => {}
        }
    }

    /// Queues the intro screens for the trial at the cursor, or starts it.
    fn begin_position(&mut self) {
        let Some(scheduled) = self.schedule.get(self.cursor).copied() else {
            self.end_session();
            return;
        };
        if scheduled.opens_block() {
            let intro = self.intro_screens(&scheduled);
            self.screens.extend(intro);
            self.screen_shown_at = self.timer.now();
        }
        if self.screens.is_empty() {
            self.start_trial();
        }
    }

    fn intro_screens(&self, scheduled: &ScheduledTrial) -> Vec<Instruction> {
        match (scheduled.kind, scheduled.rep) {
            (BlockKind::PracticeGo, _) => vec![Instruction::PracticeGoWarning],
            (BlockKind::TestGo, _) => {
                vec![Instruction::DoYouUnderstand, Instruction::TestGoWarning]
            }
            (BlockKind::PracticeMixed, _) => vec![
                Instruction::StopInstructions,
                Instruction::PracticeMixedWarning,
            ],
            (BlockKind::TestMixed, 0) => {
                let mut screens = Vec::with_capacity(3);
                if !self.config.plan.practice {
                    screens.push(Instruction::StopInstructions);
                }
                screens.push(Instruction::DoYouUnderstand);
                screens.push(Instruction::TestMixedWarning);
                screens
            }
            (BlockKind::TestMixed, rep) => vec![Instruction::BlockComplete {
                done: rep,
                total: scheduled.reps,
            }],
        }
    }

    fn start_trial(&mut self) {
        let Some(scheduled) = self.schedule.get(self.cursor).copied() else {
            self.end_session();
            return;
        };
        if scheduled.kind == BlockKind::TestMixed && scheduled.rep == 0 && scheduled.index == 0 {
            self.controller.reset();
            debug!("SSD reset for test blocks");
        }
        let stop_delay = self.controller.delay_for(&scheduled.spec);
        let jitter = self.draw_jitter();
        let now = self.timer.now();

        debug!(
            position = self.cursor,
            block = scheduled.kind.label(),
            rep = scheduled.rep,
            index = scheduled.index,
            signal = %scheduled.spec.signal,
            ssd = ?stop_delay,
            "trial started"
        );
        self.current = Some(Trial {
            position: self.cursor,
            scheduled,
            stop_delay,
            jitter,
            timestamps: TrialTimestamps {
                state_entered: now,
                ..TrialTimestamps::default()
            },
            state: TrialState::HoldPrompt,
            outcome: None,
            final_fill_cm: 0.0,
        });
    }

    fn draw_jitter(&mut self) -> f64 {
        self.config
            .timing
            .jitter_choices
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default()
    }

    fn response_lifted(&mut self) -> Result<(), ExperimentError> {
        let now = self.timer.now();
        let trial_length = self.config.timing.trial_length;
        let Some(state) = self.current.as_ref().map(|t| t.state) else {
            return Ok(());
        };
        match state {
            TrialState::Countdown | TrialState::Jitter => {
                debug!("response lifted before the bar started");
                let jitter = self.draw_jitter();
                if let Some(trial) = self.current.as_mut() {
                    trial.jitter = jitter;
                    enter(trial, TrialState::TooSoon, now);
                }
            }
            TrialState::Filling => {
                let started = self
                    .current
                    .as_ref()
                    .and_then(|t| t.timestamps.filling_start)
                    .unwrap_or(now);
                // A lift at or past the timeout counts as no lift.
                let release = (seconds_between(started, now) < trial_length).then_some(now);
                self.finish_trial(release)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_trial(&mut self, release: Option<u64>) -> Result<(), ExperimentError> {
        let now = self.timer.now();
        let Some(trial) = self.current.as_mut() else {
            return Ok(());
        };
        trial.timestamps.release = release;
        let filling_start = trial.timestamps.filling_start.unwrap_or(now);
        let release_time = release.map(|r| seconds_between(filling_start, r));
        self.resolve_trial(release.is_some(), release_time)
    }

    /// Classifies the current trial from its release timing. Anomalous
    /// timings are excluded from the output and from the staircase.
    fn resolve_trial(
        &mut self,
        released: bool,
        release_time: Option<f64>,
    ) -> Result<(), ExperimentError> {
        let now = self.timer.now();
        let timing = &self.config.timing;
        let bar = self.config.presentation.bar_height_cm;
        let Some(trial) = self.current.as_mut() else {
            return Ok(());
        };

        let result = classify(&TrialTiming {
            signal: trial.scheduled.spec.signal,
            released,
            release_time,
            effective_stop_delay: trial.stop_delay,
            target_time: timing.target_time,
            trial_length: timing.trial_length,
        });
        let shown_until = release_time
            .unwrap_or(timing.trial_length)
            .clamp(0.0, timing.trial_length);
        trial.final_fill_cm = bar_height(
            shown_until,
            trial.bar_stop_time(timing.trial_length),
            bar,
            timing.trial_length,
        );
        enter(trial, TrialState::Feedback, now);
        let scheduled = trial.scheduled;

        match result {
            Ok(outcome) => {
                trial.outcome = Some(outcome);
                self.controller.record(&outcome);
                let record = TrialRecord::new(
                    &self.config.participant_id,
                    scheduled.rep,
                    scheduled.kind.label(),
                    scheduled.index,
                    &outcome,
                );
                self.sink.write_record(&record)?;
                info!(
                    block = scheduled.kind.label(),
                    rep = scheduled.rep,
                    trial = scheduled.index,
                    outcome = %outcome.category,
                    rt = ?outcome.reaction_time,
                    ssd = ?outcome.effective_stop_delay,
                    "trial complete"
                );
                self.results.push(CompletedTrial { scheduled, outcome });
            }
            Err(anomaly) => {
                warn!(%anomaly, position = self.cursor, "trial excluded");
                self.anomalies += 1;
                self.controller.discard_pending();
            }
        }

        let stats = self.timer.calibration_stats();
        debug!(
            frames = self.timer.frame_count(),
            mean_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
        self.timer.clear_frames();
        Ok(())
    }

    fn advance(&mut self) {
        self.current = None;
        self.cursor += 1;
        self.begin_position();
    }

    fn end_session(&mut self) {
        self.current = None;
        self.phase = SessionPhase::End;
        self.screens.clear();
        self.screens.push_back(Instruction::End);
        self.screen_shown_at = self.timer.now();
    }

    fn abort(&mut self) {
        if !self.finished {
            warn!(position = self.cursor, "session aborted");
        }
        self.aborted = true;
        self.finished = true;
        self.current = None;
        self.screens.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// All scheduled trials ran.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.schedule.len()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref()
    }

    pub fn current_trial_state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    pub fn current_screen(&self) -> Option<Instruction> {
        self.screens.front().copied()
    }

    /// A screen is waiting for a key.
    pub fn is_awaiting_input(&self) -> bool {
        !self.screens.is_empty()
    }

    /// Trials are running and none is waiting on a screen.
    pub fn in_trial(&self) -> bool {
        self.phase.is_running() && self.current.is_some()
    }

    pub fn response_held(&self) -> bool {
        self.response_held
    }

    /// Seconds since the bar started rising, while it is rising.
    pub fn filling_elapsed(&self) -> Option<f64> {
        let trial = self.current.as_ref()?;
        match (trial.state, trial.timestamps.filling_start) {
            (TrialState::Filling, Some(start)) => Some(seconds_between(start, self.timer.now())),
            _ => None,
        }
    }

    pub fn controller(&self) -> &SsdController {
        &self.controller
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn results(&self) -> &[CompletedTrial] {
        &self.results
    }

    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_trials(
            &self.config.participant_id,
            &self.results,
            self.anomalies,
            self.is_complete() && !self.aborted,
        )
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}

fn enter(trial: &mut Trial, state: TrialState, now: u64) {
    trial.state = state;
    trial.timestamps.state_entered = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{ConditionSet, ConditionTable};
    use crate::config::TaskConfig;
    use arit_core::{Signal, TrialSpec};
    use arit_timing::ManualTimer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    type Machine = ExperimentStateMachine<ManualTimer, StdRng, Vec<TrialRecord>>;

    fn machine(task: TaskConfig, mixed: Vec<TrialSpec>) -> Machine {
        let config = task.validate().unwrap();
        let mut conditions = ConditionSet::new();
        for kind in BlockKind::ORDER {
            let rows = if kind.is_mixed() {
                mixed.clone()
            } else {
                vec![TrialSpec::go()]
            };
            conditions.insert(
                kind,
                ConditionTable {
                    name: kind.label().to_string(),
                    rows,
                },
            );
        }
        let mut rng = StdRng::seed_from_u64(7);
        let schedule =
            Schedule::build(&config.plan, &conditions, config.order, &mut rng).unwrap();
        ExperimentStateMachine::new(config, schedule, ManualTimer::new(), rng, Vec::new())
    }

    fn test_only() -> TaskConfig {
        TaskConfig {
            practice_trials: false,
            test_go_block: false,
            test_mixed_blocks: 1,
            trial_order: "sequential".to_string(),
            ..TaskConfig::default()
        }
    }

    fn tick(m: &mut Machine, seconds: f64) {
        m.timer.advance(Duration::from_secs_f64(seconds));
        m.update().unwrap();
    }

    fn pass_screens(m: &mut Machine) {
        while let Some(screen) = m.current_screen() {
            let event = if screen == Instruction::DoYouUnderstand {
                InputEvent::Yes
            } else {
                InputEvent::Continue
            };
            m.handle_event(event).unwrap();
        }
    }

    /// Holds the key and waits until the bar starts rising.
    fn hold_until_filling(m: &mut Machine) {
        m.handle_event(InputEvent::ResponseDown).unwrap();
        for _ in 0..200 {
            if m.current_trial_state() == Some(TrialState::Filling) {
                return;
            }
            tick(m, 0.01);
        }
        panic!("bar never started");
    }

    fn finish_feedback(m: &mut Machine) {
        for _ in 0..400 {
            if m.current_trial_state() != Some(TrialState::Feedback)
                && m.current_trial_state() != Some(TrialState::Complete)
            {
                return;
            }
            tick(m, 0.01);
        }
    }

    #[test]
    fn intro_screens_follow_the_block_plan() {
        let mut m = machine(TaskConfig::default(), vec![TrialSpec::go()]);
        let mut seen = Vec::new();
        while let Some(screen) = m.current_screen() {
            seen.push(screen);
            let event = if screen == Instruction::DoYouUnderstand {
                InputEvent::Yes
            } else {
                InputEvent::Continue
            };
            m.handle_event(event).unwrap();
        }
        assert_eq!(
            seen,
            vec![
                Instruction::Welcome,
                Instruction::GoInstructions,
                Instruction::PracticeGoWarning
            ]
        );
        assert_eq!(m.phase, SessionPhase::Blocks);
        assert!(!m.is_awaiting_input());
        assert!(m.in_trial());
        assert_eq!(m.current_trial_state(), Some(TrialState::HoldPrompt));
    }

    #[test]
    fn stop_instructions_shown_when_practice_skipped() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        m.handle_event(InputEvent::Continue).unwrap();
        m.handle_event(InputEvent::Continue).unwrap();
        assert_eq!(m.current_screen(), Some(Instruction::StopInstructions));
        m.handle_event(InputEvent::Continue).unwrap();
        assert_eq!(m.current_screen(), Some(Instruction::DoYouUnderstand));
        // Only y or n answer the question.
        m.handle_event(InputEvent::Continue).unwrap();
        assert_eq!(m.current_screen(), Some(Instruction::DoYouUnderstand));
    }

    #[test]
    fn answering_no_ends_the_session() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        while m.current_screen() != Some(Instruction::DoYouUnderstand) {
            m.handle_event(InputEvent::Continue).unwrap();
        }
        m.handle_event(InputEvent::No).unwrap();
        assert_eq!(m.current_screen(), Some(Instruction::End));
        assert_eq!(m.phase, SessionPhase::End);
        m.handle_event(InputEvent::Continue).unwrap();
        assert!(m.is_finished());
        assert!(!m.is_complete());
        assert!(m.sink().is_empty());
    }

    #[test]
    fn go_release_near_target_is_recorded() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 0.79);
        m.handle_event(InputEvent::ResponseUp).unwrap();

        assert_eq!(m.current_trial_state(), Some(TrialState::Feedback));
        let record = &m.sink()[0];
        assert_eq!(record.outcome, OutcomeCategory::CorrectGo);
        assert_eq!(record.correct, 1);
        assert_eq!(record.trial_type, "testBlocks");
        assert!((record.rt.unwrap() - 0.79).abs() < 1e-6);
        assert_eq!(record.ssd, None);

        let scene = m.scene();
        assert_eq!(scene.message.as_deref(), Some("Well done!"));
        let bar = scene.bar.unwrap();
        assert!((bar.fill_cm - 0.79 * 15.0).abs() < 1e-4);
        assert_eq!(bar.arrow_color, Palette::STANDARD.best());
    }

    #[test]
    fn held_through_go_trial_is_an_omission() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 1.0);
        let record = &m.sink()[0];
        assert_eq!(record.outcome, OutcomeCategory::Omission);
        assert_eq!(record.correct, -1);
        assert_eq!(record.rt, None);
    }

    #[test]
    fn withheld_stop_raises_the_next_delay() {
        let mut m = machine(
            test_only(),
            vec![TrialSpec::stop(None), TrialSpec::stop(None)],
        );
        pass_screens(&mut m);
        assert_eq!(m.current_trial().unwrap().stop_delay, Some(0.5));
        hold_until_filling(&mut m);

        // Bar freezes at the SSD.
        tick(&mut m, 0.7);
        let bar = m.scene().bar.unwrap();
        assert!((bar.fill_cm - 7.5).abs() < 1e-9);

        tick(&mut m, 0.3);
        assert_eq!(m.sink()[0].outcome, OutcomeCategory::CorrectStop);
        assert_eq!(m.sink()[0].ssd, Some(0.5));

        finish_feedback(&mut m);
        assert_eq!(m.current_trial().unwrap().stop_delay, Some(0.525));
        assert_eq!(m.controller().current_delay(), Some(0.525));
    }

    #[test]
    fn failed_stop_lowers_the_next_delay() {
        let mut m = machine(
            test_only(),
            vec![TrialSpec::stop(None), TrialSpec::go(), TrialSpec::stop(None)],
        );
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 0.6);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        assert_eq!(m.sink()[0].outcome, OutcomeCategory::IncorrectStop);
        assert_eq!(m.sink()[0].correct, 0);
        finish_feedback(&mut m);

        // Intervening go trial leaves the staircase alone.
        assert_eq!(m.current_trial().unwrap().stop_delay, None);
        hold_until_filling(&mut m);
        tick(&mut m, 0.8);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        finish_feedback(&mut m);

        assert_eq!(m.current_trial().unwrap().stop_delay, Some(0.475));
    }

    #[test]
    fn anomalous_timing_is_excluded_and_holds_the_delay() {
        let mut m = machine(
            test_only(),
            vec![
                TrialSpec::stop(None),
                TrialSpec::stop(None),
                TrialSpec::stop(None),
            ],
        );
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 1.0);
        finish_feedback(&mut m);

        assert_eq!(m.current_trial().unwrap().stop_delay, Some(0.525));
        hold_until_filling(&mut m);
        tick(&mut m, 0.3);
        m.resolve_trial(true, Some(-0.01)).unwrap();

        assert_eq!(m.current_trial_state(), Some(TrialState::Feedback));
        assert_eq!(m.anomalies(), 1);
        assert_eq!(m.sink().len(), 1);
        assert_eq!(m.results().len(), 1);
        assert_eq!(m.summary().excluded_trials, 1);

        finish_feedback(&mut m);
        assert_eq!(m.current_trial().unwrap().stop_delay, Some(0.525));
    }

    #[test]
    fn lifting_during_jitter_shows_too_soon() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        pass_screens(&mut m);
        m.handle_event(InputEvent::ResponseDown).unwrap();
        tick(&mut m, 0.01);
        assert_eq!(m.current_trial_state(), Some(TrialState::Jitter));
        m.handle_event(InputEvent::ResponseUp).unwrap();
        assert_eq!(m.current_trial_state(), Some(TrialState::TooSoon));
        assert!(m.scene().message.unwrap().contains("too soon"));
        assert!(m.sink().is_empty());

        hold_until_filling(&mut m);
        assert_eq!(m.current_trial_state(), Some(TrialState::Filling));
    }

    #[test]
    fn countdown_precedes_jitter_when_enabled() {
        let task = TaskConfig {
            count_down: true,
            ..test_only()
        };
        let mut m = machine(task, vec![TrialSpec::go()]);
        pass_screens(&mut m);
        m.handle_event(InputEvent::ResponseDown).unwrap();
        tick(&mut m, 0.0);
        assert_eq!(m.current_trial_state(), Some(TrialState::Countdown));
        tick(&mut m, 0.5);
        assert_eq!(m.scene().countdown, Some(3));
        tick(&mut m, 1.0);
        assert_eq!(m.scene().countdown, Some(2));
        tick(&mut m, 1.5);
        assert_eq!(m.current_trial_state(), Some(TrialState::Jitter));
    }

    #[test]
    fn block_break_needs_minimum_wait() {
        let task = TaskConfig {
            test_mixed_blocks: 2,
            ..test_only()
        };
        let mut m = machine(task, vec![TrialSpec::go()]);
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 0.8);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        finish_feedback(&mut m);

        assert_eq!(
            m.current_screen(),
            Some(Instruction::BlockComplete { done: 1, total: 2 })
        );
        m.handle_event(InputEvent::Continue).unwrap();
        assert!(m.current_screen().is_some());
        m.timer.advance(Duration::from_secs(3));
        m.handle_event(InputEvent::Continue).unwrap();
        assert_eq!(m.current_screen(), None);
        assert_eq!(m.current_trial().unwrap().scheduled.rep, 1);
    }

    #[test]
    fn staircase_resets_when_test_blocks_start() {
        let task = TaskConfig {
            test_go_block: false,
            test_mixed_blocks: 1,
            trial_order: "sequential".to_string(),
            ..TaskConfig::default()
        };
        let mut m = machine(task, vec![TrialSpec::stop(None)]);
        pass_screens(&mut m);
        // Practice go trial.
        hold_until_filling(&mut m);
        tick(&mut m, 0.8);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        finish_feedback(&mut m);
        pass_screens(&mut m);

        // Practice stop trial, withheld.
        assert_eq!(m.current_trial().unwrap().scheduled.kind, BlockKind::PracticeMixed);
        hold_until_filling(&mut m);
        tick(&mut m, 1.0);
        finish_feedback(&mut m);
        pass_screens(&mut m);

        let trial = m.current_trial().unwrap();
        assert_eq!(trial.scheduled.kind, BlockKind::TestMixed);
        assert_eq!(trial.stop_delay, Some(0.5));
    }

    #[test]
    fn escape_aborts_and_keeps_written_records() {
        let mut m = machine(test_only(), vec![TrialSpec::go(), TrialSpec::go()]);
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 0.8);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        m.handle_event(InputEvent::Abort).unwrap();
        assert!(m.is_finished());
        assert!(m.is_aborted());
        assert_eq!(m.sink().len(), 1);
        assert!(!m.summary().completed);
    }

    #[test]
    fn full_session_completes() {
        let mut m = machine(test_only(), vec![TrialSpec::go()]);
        pass_screens(&mut m);
        hold_until_filling(&mut m);
        tick(&mut m, 0.8);
        m.handle_event(InputEvent::ResponseUp).unwrap();
        finish_feedback(&mut m);
        assert_eq!(m.current_screen(), Some(Instruction::End));
        m.handle_event(InputEvent::Continue).unwrap();
        assert!(m.is_finished());
        assert!(m.summary().completed);
        assert_eq!(m.summary().test_trials, 1);
        assert_eq!(m.results().len(), 1);
        assert_eq!(m.anomalies(), 0);
        assert_eq!(Signal::Go.code(), m.sink()[0].signal);
    }
}
