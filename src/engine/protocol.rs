use crate::config::FeatureSet;
use crate::error::UserFacingError;
use crate::minigame::hidden_object::HiddenZone;
use crate::model::segment::{ChoiceKey, NarrativeSegment, SegmentId};
use crate::model::turn::ActiveTurn;

/// Player intents sent from the UI thread to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Begins a new story, discarding the current one.
    Start,
    Choose(ChoiceKey),
    RequestAnimation(SegmentId),
    AttemptHiddenObject {
        segment: SegmentId,
        zone: HiddenZone,
    },
    PlacePuzzlePiece {
        segment: SegmentId,
        piece: usize,
        row: usize,
        col: usize,
    },
    PuzzleHint(SegmentId),
    TogglePlayback(SegmentId),
    ProvideCredential(String),
    Shutdown,
}

pub enum EngineResponse {
    Snapshot(Box<StorySnapshot>),
}

/// Everything the presentation layer draws.
#[derive(Debug, Clone, Default)]
pub struct StorySnapshot {
    pub segments: Vec<NarrativeSegment>,
    pub turn: Option<ActiveTurn>,
    pub loading: bool,
    pub error: Option<UserFacingError>,
    pub active_playback: Option<SegmentId>,
    pub has_credential: bool,
    pub features: FeatureSet,
    /// Animation requests sent but not yet finished.
    pub animations_in_flight: Vec<SegmentId>,
}

impl StorySnapshot {
    /// The latest segment's game is holding back the next question.
    pub fn awaiting_game(&self) -> bool {
        !self.loading
            && self.turn.is_none()
            && self.segments.last().is_some_and(NarrativeSegment::is_gated)
    }

    pub fn is_animating(&self, segment: &SegmentId) -> bool {
        self.animations_in_flight.contains(segment)
    }
}
