use serde::{Deserialize, Serialize};

/// Coarse session progression
#[derive(Copy, Debug, Clone, PartialEq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    GoInstructions,
    Blocks,
    End,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => GoInstructions,
            GoInstructions => Blocks,
            Blocks => End,
            End => return None,
        })
    }

    /// Trials are being scheduled.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionPhase::Blocks)
    }
}

/// The four kinds of trial block, in the order they run
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    PracticeGo,
    TestGo,
    PracticeMixed,
    TestMixed,
}

impl BlockKind {
    pub const ORDER: [BlockKind; 4] = [
        BlockKind::PracticeGo,
        BlockKind::TestGo,
        BlockKind::PracticeMixed,
        BlockKind::TestMixed,
    ];

    /// Label written to the `trialType` column; also the condition file stem.
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::PracticeGo => "practiceGoTrials",
            BlockKind::TestGo => "testGoBlocks",
            BlockKind::PracticeMixed => "practiceMixedTrials",
            BlockKind::TestMixed => "testBlocks",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.label())
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, BlockKind::PracticeGo | BlockKind::PracticeMixed)
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, BlockKind::PracticeMixed | BlockKind::TestMixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_to_end() {
        let mut phase = SessionPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                SessionPhase::Welcome,
                SessionPhase::GoInstructions,
                SessionPhase::Blocks,
                SessionPhase::End
            ]
        );
        assert!(SessionPhase::Blocks.is_running());
    }

    #[test]
    fn block_labels_name_condition_files() {
        assert_eq!(BlockKind::TestMixed.file_name(), "testBlocks.csv");
        assert!(BlockKind::PracticeMixed.is_practice());
        assert!(BlockKind::PracticeMixed.is_mixed());
        assert!(!BlockKind::TestGo.is_mixed());
    }
}
