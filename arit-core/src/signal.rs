use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Trial type read from a condition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Signal {
    Go,
    Stop,
}

impl Signal {
    /// Numeric code used in condition tables and output files (0 = Go, 1 = Stop).
    pub fn code(self) -> u8 {
        match self {
            Signal::Go => 0,
            Signal::Stop => 1,
        }
    }

    pub fn is_stop(self) -> bool {
        matches!(self, Signal::Stop)
    }
}

impl TryFrom<u8> for Signal {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Signal::Go),
            1 => Ok(Signal::Stop),
            other => Err(ConfigError::UnknownSignal(other)),
        }
    }
}

impl From<Signal> for u8 {
    fn from(signal: Signal) -> Self {
        signal.code()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_condition_tables() {
        assert_eq!(Signal::try_from(0).unwrap(), Signal::Go);
        assert_eq!(Signal::try_from(1).unwrap(), Signal::Stop);
        assert!(matches!(
            Signal::try_from(2),
            Err(ConfigError::UnknownSignal(2))
        ));
        assert_eq!(Signal::Stop.to_string(), "1");
    }
}
