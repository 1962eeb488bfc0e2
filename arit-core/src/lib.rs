pub mod bar;
pub mod error;
pub mod outcome;
pub mod phase;
pub mod scene;
pub mod signal;
pub mod trial;

pub use bar::bar_height;
pub use error::{ConfigError, TimingAnomaly};
pub use outcome::{OutcomeCategory, Proximity};
pub use phase::{BlockKind, SessionPhase};
pub use scene::{BarScene, Scene};
pub use signal::Signal;
pub use trial::{TrialOutcome, TrialRecord, TrialSpec, TrialState};
