pub mod classify;
pub mod conditions;
pub mod config;
pub mod error;
pub mod instructions;
pub mod output;
pub mod schedule;
pub mod simulate;
pub mod staircase;
pub mod state;
pub mod summary;
pub mod trial;

pub use classify::{classify, TrialTiming, ALMOST_GO_LIMIT};
pub use conditions::{ConditionSet, ConditionTable};
pub use config::{
    BlockPlan, ConfigFileError, OutputFormat, Palette, Presentation, SsdMethod, TaskConfig,
    TaskTiming, TrialOrder, ValidatedConfig,
};
pub use error::{ConditionsError, ExperimentError, OutputError};
pub use instructions::Instruction;
pub use output::{OutputWriter, RecordSink};
pub use schedule::{Schedule, ScheduledTrial};
pub use simulate::{run_simulation, SimulatedParticipant};
pub use staircase::{next_delay, SsdController, StaircaseBounds, StaircaseState, StaircaseStep};
pub use state::{ExperimentStateMachine, InputEvent};
pub use summary::SessionSummary;
pub use trial::{CompletedTrial, Trial, TrialTimestamps};
