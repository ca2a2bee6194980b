use rand::Rng;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::minigame::hidden_object::HiddenObjectGame;
use crate::minigame::jigsaw::{JigsawGame, PuzzleSize};
use crate::minigame::{MiniGame, MiniGameKind};
use crate::model::response::NarrativeResponse;
use crate::model::segment::NarrativeSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    /// The follow-up question is offered as soon as the text arrives.
    Immediate,
    /// The follow-up question waits for the segment's mini-game.
    GatedByGame,
}

impl GatePolicy {
    pub fn for_kind(kind: MiniGameKind) -> Self {
        match kind {
            MiniGameKind::None => GatePolicy::Immediate,
            MiniGameKind::HiddenObject | MiniGameKind::Jigsaw => GatePolicy::GatedByGame,
        }
    }
}

/// Decides when a segment's follow-up question becomes the active turn.
#[derive(Debug, Clone)]
pub struct ProgressionGate {
    kind: MiniGameKind,
    jigsaw_delay: Duration,
    hidden_object_delay: Duration,
}

impl ProgressionGate {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            kind: config.features.mini_game,
            jigsaw_delay: config.jigsaw_gate_delay,
            hidden_object_delay: config.hidden_object_gate_delay,
        }
    }

    pub fn policy(&self) -> GatePolicy {
        GatePolicy::for_kind(self.kind)
    }

    /// Builds the game for a new segment. `story_number` is 1-based.
    ///
    /// A hidden-object response that names no object gets no game.
    pub fn attach<R: Rng + ?Sized>(
        &self,
        response: &NarrativeResponse,
        story_number: usize,
        rng: &mut R,
    ) -> Option<MiniGame> {
        match self.kind {
            MiniGameKind::None => None,
            MiniGameKind::HiddenObject => response
                .hidden_object()
                .map(|target| MiniGame::HiddenObject(HiddenObjectGame::new(target.name, target.zone))),
            MiniGameKind::Jigsaw => Some(MiniGame::Jigsaw(JigsawGame::new(
                PuzzleSize::for_story(story_number),
                rng,
            ))),
        }
    }

    pub fn opens_immediately(&self, segment: &NarrativeSegment) -> bool {
        self.policy() == GatePolicy::Immediate || !segment.is_gated()
    }

    /// Pause between solving a game and showing the next question.
    pub fn release_delay(&self, game: &MiniGame) -> Duration {
        match game {
            MiniGame::HiddenObject(_) => self.hidden_object_delay,
            MiniGame::Jigsaw(_) => self.jigsaw_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureSet;
    use crate::minigame::hidden_object::HiddenZone;
    use crate::model::segment::{
        AnimationState, MediaPrompts, MediaSlot, PathTone, SegmentId, SegmentMedia, StoryChoice,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gate(kind: MiniGameKind) -> ProgressionGate {
        ProgressionGate::new(&EngineConfig {
            features: FeatureSet {
                mini_game: kind,
                ..FeatureSet::default()
            },
            ..EngineConfig::default()
        })
    }

    fn response(object: Option<&str>) -> NarrativeResponse {
        NarrativeResponse {
            new_world_summary: String::new(),
            story_result: "The lights return.".into(),
            new_question: "Who keeps the switch?".into(),
            choice_a: "The mayor".into(),
            choice_b: "Nobody".into(),
            speech_narration_story: String::new(),
            image_generation_prompt: String::new(),
            animation_description: String::new(),
            hidden_object_name: object.map(str::to_string),
            hidden_object_location: Some("top-left".into()),
        }
    }

    fn segment(mini_game: Option<MiniGame>) -> NarrativeSegment {
        NarrativeSegment {
            id: SegmentId::new(0),
            tone: PathTone::Utopia,
            narrative_text: "The lights return.".into(),
            origin: None,
            follow_up_question: "Who keeps the switch?".into(),
            follow_up_choices: StoryChoice::new("The mayor", "Nobody"),
            prompts: MediaPrompts::default(),
            media: SegmentMedia {
                image: MediaSlot::Pending,
                narration: MediaSlot::Disabled,
                animation: AnimationState::NotStarted,
            },
            mini_game,
        }
    }

    #[test]
    fn policy_follows_the_configured_game() {
        assert_eq!(gate(MiniGameKind::None).policy(), GatePolicy::Immediate);
        assert_eq!(gate(MiniGameKind::Jigsaw).policy(), GatePolicy::GatedByGame);
        assert_eq!(gate(MiniGameKind::HiddenObject).policy(), GatePolicy::GatedByGame);
    }

    #[test]
    fn missing_hidden_object_leaves_segment_ungated() {
        let gate = gate(MiniGameKind::HiddenObject);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(gate.attach(&response(None), 1, &mut rng).is_none());
        assert!(gate.opens_immediately(&segment(None)));

        let game = gate.attach(&response(Some("compass")), 1, &mut rng);
        match &game {
            Some(MiniGame::HiddenObject(game)) => assert_eq!(game.target(), HiddenZone::TopLeft),
            other => panic!("unexpected game {other:?}"),
        }
        assert!(!gate.opens_immediately(&segment(game)));
    }

    #[test]
    fn jigsaw_grows_with_story_number() {
        let gate = gate(MiniGameKind::Jigsaw);
        let mut rng = StdRng::seed_from_u64(3);

        let Some(MiniGame::Jigsaw(game)) = gate.attach(&response(None), 4, &mut rng) else {
            panic!("expected a jigsaw");
        };
        assert_eq!(game.size(), PuzzleSize::new(3, 3));
    }

    #[test]
    fn solved_game_no_longer_gates() {
        let gate = gate(MiniGameKind::HiddenObject);
        let mut game = HiddenObjectGame::new("compass", HiddenZone::TopLeft);
        game.attempt(HiddenZone::TopLeft);

        assert!(gate.opens_immediately(&segment(Some(MiniGame::HiddenObject(game)))));
    }

    #[test]
    fn delays_differ_per_game() {
        let gate = gate(MiniGameKind::Jigsaw);
        let mut rng = StdRng::seed_from_u64(1);
        let jigsaw = MiniGame::Jigsaw(JigsawGame::new(PuzzleSize::new(2, 2), &mut rng));
        let search = MiniGame::HiddenObject(HiddenObjectGame::new("coin", HiddenZone::TopLeft));

        assert_eq!(gate.release_delay(&jigsaw), Duration::from_millis(500));
        assert_eq!(gate.release_delay(&search), Duration::from_millis(1_000));
    }
}
