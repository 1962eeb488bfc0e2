use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use arit_core::{BlockKind, ConfigError, Signal, TrialSpec};
use serde::Deserialize;
use tracing::debug;

use crate::config::BlockPlan;
use crate::error::ConditionsError;

#[derive(Debug, Deserialize)]
struct ConditionRow {
    #[serde(rename = "Signal")]
    signal: u8,
    #[serde(rename = "fixedStopTime", default)]
    fixed_stop_time: Option<f64>,
}

/// Trials of one block, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTable {
    pub name: String,
    pub rows: Vec<TrialSpec>,
}

impl ConditionTable {
    pub fn from_reader<R: io::Read>(name: &str, reader: R) -> Result<Self, ConditionsError> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut rows = Vec::new();
        for (index, row) in csv.deserialize::<ConditionRow>().enumerate() {
            let row = row.map_err(|source| ConditionsError::Csv {
                table: name.to_string(),
                source,
            })?;
            let signal = Signal::try_from(row.signal).map_err(|source| ConditionsError::Row {
                table: name.to_string(),
                row: index + 1,
                source,
            })?;
            rows.push(TrialSpec {
                signal,
                fixed_stop_delay: row.fixed_stop_time,
            });
        }
        if rows.is_empty() {
            return Err(ConditionsError::Empty(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            rows,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConditionsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConditionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let table = Self::from_reader(&name, file)?;
        debug!(
            table = %table.name,
            trials = table.rows.len(),
            stops = table.stop_count(),
            "loaded condition table"
        );
        Ok(table)
    }

    /// Every stop row must carry a delay inside the trial when delays come
    /// from the table.
    pub fn require_fixed_delays(&self, trial_length: f64) -> Result<(), ConfigError> {
        let stops = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.signal.is_stop());
        for (index, spec) in stops {
            match spec.fixed_stop_delay {
                None => {
                    return Err(ConfigError::MissingFixedDelay {
                        table: self.name.clone(),
                        row: index + 1,
                    })
                }
                Some(value) if !(value >= 0.0 && value < trial_length) => {
                    return Err(ConfigError::InvalidFixedDelay {
                        table: self.name.clone(),
                        row: index + 1,
                        value,
                        trial_length,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn stop_count(&self) -> usize {
        self.rows.iter().filter(|spec| spec.signal.is_stop()).count()
    }
}

/// The condition tables a session needs, keyed by block kind
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    tables: HashMap<BlockKind, ConditionTable>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `<dir>/<label>.csv` for every block the plan runs.
    pub fn load_dir<P: AsRef<Path>>(dir: P, plan: &BlockPlan) -> Result<Self, ConditionsError> {
        let mut set = Self::new();
        for kind in plan.kinds() {
            let table = ConditionTable::load(dir.as_ref().join(kind.file_name()))?;
            set.insert(kind, table);
        }
        Ok(set)
    }

    pub fn insert(&mut self, kind: BlockKind, table: ConditionTable) {
        self.tables.insert(kind, table);
    }

    pub fn get(&self, kind: BlockKind) -> Result<&ConditionTable, ConditionsError> {
        self.tables
            .get(&kind)
            .ok_or(ConditionsError::Missing(kind.label()))
    }

    pub fn require_fixed_delays(&self, trial_length: f64) -> Result<(), ConfigError> {
        self.tables
            .values()
            .try_for_each(|table| table.require_fixed_delays(trial_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_column_tables() {
        let text = "Signal,fixedStopTime\n0,\n1,0.45\n0,\n1,\n";
        let table = ConditionTable::from_reader("testBlocks", text.as_bytes()).unwrap();
        assert_eq!(
            table.rows,
            vec![
                TrialSpec::go(),
                TrialSpec::stop(Some(0.45)),
                TrialSpec::go(),
                TrialSpec::stop(None),
            ]
        );
        assert_eq!(table.stop_count(), 2);
        assert_eq!(
            table.require_fixed_delays(1.0),
            Err(ConfigError::MissingFixedDelay {
                table: "testBlocks".to_string(),
                row: 4
            })
        );
    }

    #[test]
    fn fixed_delays_must_fall_inside_the_trial() {
        let text = "Signal,fixedStopTime\n1,0.5\n1,NaN\n";
        let table = ConditionTable::from_reader("testBlocks", text.as_bytes()).unwrap();
        assert!(matches!(
            table.require_fixed_delays(1.0),
            Err(ConfigError::InvalidFixedDelay { row: 2, .. })
        ));

        let text = "Signal,fixedStopTime\n0,\n1,-0.3\n";
        let table = ConditionTable::from_reader("testBlocks", text.as_bytes()).unwrap();
        assert!(matches!(
            table.require_fixed_delays(1.0),
            Err(ConfigError::InvalidFixedDelay { row: 2, value, .. }) if value == -0.3
        ));

        let text = "Signal,fixedStopTime\n0,\n1,0.45\n";
        let table = ConditionTable::from_reader("testBlocks", text.as_bytes()).unwrap();
        assert_eq!(table.require_fixed_delays(1.0), Ok(()));
        assert!(table.require_fixed_delays(0.4).is_err());
    }

    #[test]
    fn rejects_unknown_signal_codes() {
        let text = "Signal,fixedStopTime\n0,\n3,\n";
        let err = ConditionTable::from_reader("bad", text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ConditionsError::Row {
                row: 2,
                source: ConfigError::UnknownSignal(3),
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_tables() {
        let err = ConditionTable::from_reader("empty", "Signal,fixedStopTime\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ConditionsError::Empty(_)));
    }

    #[test]
    fn missing_kind_is_an_error() {
        let set = ConditionSet::new();
        assert!(matches!(
            set.get(BlockKind::TestMixed),
            Err(ConditionsError::Missing("testBlocks"))
        ));
    }
}
