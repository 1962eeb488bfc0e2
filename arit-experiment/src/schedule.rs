use arit_core::{BlockKind, TrialSpec};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::conditions::ConditionSet;
use crate::config::{BlockPlan, SsdMethod, TrialOrder, ValidatedConfig};
use crate::error::{ConditionsError, ExperimentError};

impl BlockPlan {
    /// Block kinds that run, in order.
    pub fn kinds(&self) -> Vec<BlockKind> {
        self.blocks().into_iter().map(|(kind, _)| kind).collect()
    }

    /// Each block kind with its repetition count.
    pub fn blocks(&self) -> Vec<(BlockKind, usize)> {
        let mut blocks = Vec::with_capacity(4);
        if self.practice {
            blocks.push((BlockKind::PracticeGo, 1));
        }
        if self.test_go {
            blocks.push((BlockKind::TestGo, 1));
        }
        if self.practice {
            blocks.push((BlockKind::PracticeMixed, 1));
        }
        blocks.push((BlockKind::TestMixed, self.test_mixed_reps));
        blocks
    }
}

/// One trial in its place in the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTrial {
    pub kind: BlockKind,
    /// Repetition of this block kind, from 0.
    pub rep: usize,
    pub reps: usize,
    /// Trial within the repetition, from 0.
    pub index: usize,
    pub spec: TrialSpec,
}

impl ScheduledTrial {
    pub fn opens_block(&self) -> bool {
        self.index == 0
    }
}

/// The full, ordered list of trials for a session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    trials: Vec<ScheduledTrial>,
}

impl Schedule {
    pub fn build<R: Rng + ?Sized>(
        plan: &BlockPlan,
        conditions: &ConditionSet,
        order: TrialOrder,
        rng: &mut R,
    ) -> Result<Self, ConditionsError> {
        let mut trials = Vec::new();
        for (kind, reps) in plan.blocks() {
            let table = conditions.get(kind)?;
            for rep in 0..reps {
                let mut rows = table.rows.clone();
                if order == TrialOrder::Random {
                    rows.shuffle(rng);
                }
                trials.extend(rows.into_iter().enumerate().map(|(index, spec)| {
                    ScheduledTrial {
                        kind,
                        rep,
                        reps,
                        index,
                        spec,
                    }
                }));
            }
        }
        Ok(Self { trials })
    }

    /// Loads the condition tables named by `config` and lays out the session.
    pub fn load<R: Rng + ?Sized>(
        config: &ValidatedConfig,
        rng: &mut R,
    ) -> Result<Self, ExperimentError> {
        let conditions = ConditionSet::load_dir(&config.conditions_dir, &config.plan)?;
        if config.method == SsdMethod::Fixed {
            conditions.require_fixed_delays(config.timing.trial_length)?;
        }
        Ok(Self::build(&config.plan, &conditions, config.order, rng)?)
    }

    pub fn get(&self, position: usize) -> Option<&ScheduledTrial> {
        self.trials.get(position)
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledTrial> {
        self.trials.iter()
    }
}
