use arit_core::OutcomeCategory;

/// Screens and messages shown to the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Welcome,
    GoInstructions,
    StopInstructions,
    PracticeGoWarning,
    TestGoWarning,
    PracticeMixedWarning,
    TestMixedWarning,
    DoYouUnderstand,
    BlockComplete { done: usize, total: usize },
    PressHold,
    TooSoon,
    Feedback(OutcomeCategory),
    End,
}

impl Instruction {
    pub fn text(&self, response_key: &str) -> String {
        match self {
            Instruction::Welcome => "Welcome!\n\nPress any key to continue".to_string(),
            Instruction::GoInstructions => format!(
                "Hold down the {response_key} key.\n\
                 A bar will rise towards the target arrows.\n\
                 Lift your finger so the bar stops as close to the target as possible.\n\n\
                 Press any key to continue"
            ),
            Instruction::StopInstructions => format!(
                "Sometimes the bar will stop rising by itself before it reaches the target.\n\
                 When that happens, keep holding the {response_key} key until the trial ends.\n\n\
                 Press any key to continue"
            ),
            Instruction::PracticeGoWarning => {
                "Let's start with some practice trials.\n\nPress any key to begin".to_string()
            }
            Instruction::TestGoWarning => {
                "Now for the real trials.\n\nPress any key to begin".to_string()
            }
            Instruction::PracticeMixedWarning => {
                "Let's practise trials where the bar may stop.\n\nPress any key to begin"
                    .to_string()
            }
            Instruction::TestMixedWarning => {
                "Now for the real trials where the bar may stop.\n\nPress any key to begin"
                    .to_string()
            }
            Instruction::DoYouUnderstand => "Do you understand the task? (Y/N)".to_string(),
            Instruction::BlockComplete { done, total } => format!(
                "Block {done} of {total} complete!\n\nPress any key when ready to continue"
            ),
            Instruction::PressHold => format!("Press and hold the {response_key} key"),
            Instruction::TooSoon => format!(
                "You lifted too soon!\n\nPress and hold the {response_key} key to try again"
            ),
            Instruction::Feedback(category) => feedback_text(*category).to_string(),
            Instruction::End => {
                "The End!\nThanks for taking part!\n\nPress any key to exit".to_string()
            }
        }
    }
}

fn feedback_text(category: OutcomeCategory) -> &'static str {
    match category {
        OutcomeCategory::CorrectGo => "Well done!",
        OutcomeCategory::AlmostGo => "Too early! Wait for the bar to rise",
        OutcomeCategory::IncorrectGo => "Incorrect",
        OutcomeCategory::CorrectStop => "Correct stop!",
        OutcomeCategory::IncorrectStop => "You should have held the key",
        OutcomeCategory::Omission => "Too late! Lift when the bar reaches the target",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_response_key() {
        assert!(Instruction::PressHold.text("space").contains("space"));
        assert!(Instruction::GoInstructions.text("left").contains("left"));
        assert_eq!(
            Instruction::BlockComplete { done: 1, total: 3 }.text("space"),
            "Block 1 of 3 complete!\n\nPress any key when ready to continue"
        );
    }

    #[test]
    fn every_outcome_has_feedback() {
        for category in OutcomeCategory::ALL {
            assert!(!Instruction::Feedback(category).text("space").is_empty());
        }
    }
}
