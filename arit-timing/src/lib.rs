pub mod timer;

pub use timer::{seconds_between, CalibrationStats, HighPrecisionTimer, ManualTimer, Timer};
