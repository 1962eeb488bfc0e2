//! End-of-session performance summary over the test (non-practice) blocks.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::OutputError;
use crate::trial::CompletedTrial;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub participant_id: String,
    pub completed: bool,
    pub test_trials: usize,
    pub excluded_trials: usize,
    pub outcome_counts: BTreeMap<String, usize>,
    pub go_trials: usize,
    pub mean_go_rt: Option<f64>,
    pub stop_trials: usize,
    pub stop_success_rate: Option<f64>,
    pub mean_ssd: Option<f64>,
    /// Mean-method SSRT estimate: mean go RT minus mean SSD.
    pub ssrt_estimate: Option<f64>,
}

impl SessionSummary {
    pub fn from_trials(
        participant_id: &str,
        trials: &[CompletedTrial],
        excluded_trials: usize,
        completed: bool,
    ) -> Self {
        let test: Vec<&CompletedTrial> = trials
            .iter()
            .filter(|t| !t.scheduled.kind.is_practice())
            .collect();

        let mut outcome_counts = BTreeMap::new();
        for trial in &test {
            *outcome_counts
                .entry(trial.outcome.category.name().to_string())
                .or_insert(0) += 1;
        }

        let go: Vec<&&CompletedTrial> = test.iter().filter(|t| !t.outcome.signal.is_stop()).collect();
        let go_rts: Vec<f64> = go.iter().filter_map(|t| t.outcome.reaction_time).collect();

        let stop: Vec<&&CompletedTrial> = test.iter().filter(|t| t.outcome.signal.is_stop()).collect();
        let withheld = stop.iter().filter(|t| t.outcome.category.withheld()).count();
        let ssds: Vec<f64> = stop
            .iter()
            .filter_map(|t| t.outcome.effective_stop_delay)
            .collect();

        let mean_go_rt = mean(&go_rts);
        let mean_ssd = mean(&ssds);
        Self {
            participant_id: participant_id.to_string(),
            completed,
            test_trials: test.len(),
            excluded_trials,
            outcome_counts,
            go_trials: go.len(),
            mean_go_rt,
            stop_trials: stop.len(),
            stop_success_rate: (!stop.is_empty()).then(|| withheld as f64 / stop.len() as f64),
            mean_ssd,
            ssrt_estimate: mean_go_rt.zip(mean_ssd).map(|(rt, ssd)| rt - ssd),
        }
    }

    pub fn log(&self) {
        info!(
            participant = %self.participant_id,
            completed = self.completed,
            trials = self.test_trials,
            excluded = self.excluded_trials,
            "session finished"
        );
        info!(
            go_trials = self.go_trials,
            mean_go_rt = ?self.mean_go_rt,
            stop_trials = self.stop_trials,
            stop_success_rate = ?self.stop_success_rate,
            mean_ssd = ?self.mean_ssd,
            ssrt = ?self.ssrt_estimate,
            "performance"
        );
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), OutputError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        info!(path = %path.as_ref().display(), "summary saved");
        Ok(())
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduledTrial;
    use arit_core::{BlockKind, OutcomeCategory, Signal, TrialOutcome, TrialSpec};

    fn completed(
        kind: BlockKind,
        signal: Signal,
        category: OutcomeCategory,
        rt: Option<f64>,
        ssd: Option<f64>,
    ) -> CompletedTrial {
        CompletedTrial {
            scheduled: ScheduledTrial {
                kind,
                rep: 0,
                reps: 1,
                index: 0,
                spec: TrialSpec {
                    signal,
                    fixed_stop_delay: None,
                },
            },
            outcome: TrialOutcome {
                signal,
                category,
                response_lifted: rt.is_some(),
                reaction_time: rt,
                effective_stop_delay: ssd,
                proximity: None,
            },
        }
    }

    #[test]
    fn summarises_test_blocks_only() {
        let trials = vec![
            completed(BlockKind::PracticeMixed, Signal::Go, OutcomeCategory::CorrectGo, Some(0.1), None),
            completed(BlockKind::TestMixed, Signal::Go, OutcomeCategory::CorrectGo, Some(0.78), None),
            completed(BlockKind::TestMixed, Signal::Go, OutcomeCategory::CorrectGo, Some(0.82), None),
            completed(BlockKind::TestMixed, Signal::Go, OutcomeCategory::Omission, None, None),
            completed(BlockKind::TestMixed, Signal::Stop, OutcomeCategory::CorrectStop, None, Some(0.5)),
            completed(BlockKind::TestMixed, Signal::Stop, OutcomeCategory::IncorrectStop, Some(0.7), Some(0.6)),
        ];
        let summary = SessionSummary::from_trials("P", &trials, 1, true);
        assert_eq!(summary.test_trials, 5);
        assert_eq!(summary.excluded_trials, 1);
        assert_eq!(summary.go_trials, 3);
        assert_eq!(summary.outcome_counts["correctGo"], 2);
        assert_eq!(summary.outcome_counts["omission"], 1);
        assert!((summary.mean_go_rt.unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(summary.stop_trials, 2);
        assert_eq!(summary.stop_success_rate, Some(0.5));
        assert!((summary.mean_ssd.unwrap() - 0.55).abs() < 1e-12);
        assert!((summary.ssrt_estimate.unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_session_has_no_estimates() {
        let summary = SessionSummary::from_trials("P", &[], 0, false);
        assert_eq!(summary.test_trials, 0);
        assert_eq!(summary.mean_go_rt, None);
        assert_eq!(summary.stop_success_rate, None);
        assert_eq!(summary.ssrt_estimate, None);
    }
}
