//! Interaction state machines that can withhold the next question.

pub mod hidden_object;
pub mod jigsaw;

use serde::{Deserialize, Serialize};

use hidden_object::HiddenObjectGame;
use jigsaw::JigsawGame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiniGameKind {
    #[default]
    None,
    HiddenObject,
    Jigsaw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiniGamePhase {
    /// Waiting for the scene image.
    Pending,
    InProgress,
    Solved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiniGame {
    HiddenObject(HiddenObjectGame),
    Jigsaw(JigsawGame),
}

impl MiniGame {
    pub fn phase(&self) -> MiniGamePhase {
        match self {
            MiniGame::HiddenObject(game) => game.phase(),
            MiniGame::Jigsaw(game) => game.phase(),
        }
    }

    pub fn is_solved(&self) -> bool {
        self.phase() == MiniGamePhase::Solved
    }

    /// The scene image arrived and the game can be played.
    pub fn reveal(&mut self) {
        match self {
            MiniGame::HiddenObject(game) => game.reveal(),
            MiniGame::Jigsaw(game) => game.reveal(),
        }
    }
}
