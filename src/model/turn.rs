use crate::model::segment::StoryChoice;

/// The question currently offered to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTurn {
    pub question: String,
    pub choices: StoryChoice,

    /// A choice was made and its narrative is being generated.
    pub in_flight: bool,
}

impl ActiveTurn {
    pub fn new(question: impl Into<String>, choices: StoryChoice) -> Self {
        Self {
            question: question.into(),
            choices,
            in_flight: false,
        }
    }
}
