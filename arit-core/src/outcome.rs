use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete result of one completed trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeCategory {
    CorrectGo,
    /// Never produced by classification; represents legacy go rows coded 0.
    IncorrectGo,
    /// Go release within the first 100 ms of the trial.
    AlmostGo,
    CorrectStop,
    Omission,
    IncorrectStop,
}

impl OutcomeCategory {
    pub const ALL: [OutcomeCategory; 6] = [
        OutcomeCategory::CorrectGo,
        OutcomeCategory::IncorrectGo,
        OutcomeCategory::AlmostGo,
        OutcomeCategory::CorrectStop,
        OutcomeCategory::Omission,
        OutcomeCategory::IncorrectStop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutcomeCategory::CorrectGo => "correctGo",
            OutcomeCategory::IncorrectGo => "incorrectGo",
            OutcomeCategory::AlmostGo => "almostGo",
            OutcomeCategory::CorrectStop => "correctStop",
            OutcomeCategory::Omission => "omission",
            OutcomeCategory::IncorrectStop => "incorrectStop",
        }
    }

    /// The numeric `correct` column expected by downstream analysis scripts:
    /// -1 omission, 0 failed stop, 1 go response, 2 correct stop.
    pub fn legacy_code(self) -> i8 {
        match self {
            OutcomeCategory::Omission => -1,
            OutcomeCategory::IncorrectGo | OutcomeCategory::IncorrectStop => 0,
            OutcomeCategory::CorrectGo | OutcomeCategory::AlmostGo => 1,
            OutcomeCategory::CorrectStop => 2,
        }
    }

    /// Whether the response was withheld. Omissions count as withheld.
    pub fn withheld(self) -> bool {
        matches!(self, OutcomeCategory::CorrectStop | OutcomeCategory::Omission)
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How close a go release landed to the target line. Cosmetic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Proximity {
    /// |error| < 20 ms
    Bullseye,
    /// 20 ms <= |error| < 40 ms
    Close,
    /// 40 ms <= |error| < 60 ms
    Near,
    /// |error| >= 60 ms
    Off,
}

impl Proximity {
    pub const THRESHOLDS: [f64; 3] = [0.02, 0.04, 0.06];

    pub fn from_release(release_time: f64, target_time: f64) -> Self {
        let error = (release_time - target_time).abs();
        if error < Self::THRESHOLDS[0] {
            Proximity::Bullseye
        } else if error < Self::THRESHOLDS[1] {
            Proximity::Close
        } else if error < Self::THRESHOLDS[2] {
            Proximity::Near
        } else {
            Proximity::Off
        }
    }

    /// Index into a four-colour feedback palette, best first.
    pub fn palette_index(self) -> usize {
        match self {
            Proximity::Bullseye => 0,
            Proximity::Close => 1,
            Proximity::Near => 2,
            Proximity::Off => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_buckets_are_lower_inclusive() {
        let target = 0.8;
        assert_eq!(Proximity::from_release(0.8, target), Proximity::Bullseye);
        assert_eq!(Proximity::from_release(0.81, target), Proximity::Bullseye);
        assert_eq!(Proximity::from_release(0.775, target), Proximity::Close);
        assert_eq!(Proximity::from_release(0.85, target), Proximity::Near);
        assert_eq!(Proximity::from_release(0.70, target), Proximity::Off);
        assert_eq!(Proximity::from_release(0.2, target), Proximity::Off);
    }

    #[test]
    fn legacy_codes_match_analysis_scripts() {
        assert_eq!(OutcomeCategory::Omission.legacy_code(), -1);
        assert_eq!(OutcomeCategory::IncorrectStop.legacy_code(), 0);
        assert_eq!(OutcomeCategory::IncorrectGo.legacy_code(), 0);
        assert_eq!(OutcomeCategory::CorrectGo.legacy_code(), 1);
        assert_eq!(OutcomeCategory::AlmostGo.legacy_code(), 1);
        assert_eq!(OutcomeCategory::CorrectStop.legacy_code(), 2);
    }

    #[test]
    fn omission_counts_as_withheld() {
        assert!(OutcomeCategory::Omission.withheld());
        assert!(OutcomeCategory::CorrectStop.withheld());
        assert!(!OutcomeCategory::IncorrectStop.withheld());
        assert!(!OutcomeCategory::CorrectGo.withheld());
    }
}
