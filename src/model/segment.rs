use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UserFacingError;
use crate::minigame::MiniGame;
use crate::model::media::{AudioClip, SceneImage, VideoClip};

/// Identifier of a segment, rendered as `seg-N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(u64);

impl SegmentId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg-{}", self.0)
    }
}

/// Narrative register, alternated every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTone {
    #[default]
    Utopia,
    Dystopia,
}

impl PathTone {
    pub fn opposite(self) -> Self {
        match self {
            PathTone::Utopia => PathTone::Dystopia,
            PathTone::Dystopia => PathTone::Utopia,
        }
    }

    /// Tone of the next segment given the tone of the last one.
    pub fn following(previous: Option<PathTone>, starting: PathTone) -> PathTone {
        previous.map(PathTone::opposite).unwrap_or(starting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PathTone::Utopia => "utopia",
            PathTone::Dystopia => "dystopia",
        }
    }
}

impl fmt::Display for PathTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceKey {
    A,
    B,
}

impl fmt::Display for ChoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceKey::A => f.write_str("A"),
            ChoiceKey::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryChoice {
    pub a: String,
    pub b: String,
}

impl StoryChoice {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    pub fn option(&self, key: ChoiceKey) -> &str {
        match key {
            ChoiceKey::A => &self.a,
            ChoiceKey::B => &self.b,
        }
    }
}

/// Output of one background media producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSlot<T> {
    /// The feature is switched off for this session.
    Disabled,
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> MediaSlot<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            MediaSlot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MediaSlot::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MediaSlot::Pending)
    }
}

/// Lifecycle of the video job attached to a segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnimationState {
    #[default]
    NotStarted,
    /// The job has been handed to the backend.
    Submitted,
    /// Status checks so far.
    Polling { checks: u32 },
    Done(VideoClip),
    Failed(String),
}

impl AnimationState {
    pub fn is_running(&self) -> bool {
        matches!(self, AnimationState::Submitted | AnimationState::Polling { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AnimationState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Prompts the backend produced for the media of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaPrompts {
    pub narration: String,
    pub image: String,
    pub animation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMedia {
    pub image: MediaSlot<SceneImage>,
    pub narration: MediaSlot<AudioClip>,
    pub animation: AnimationState,
}

/// The question that led to a segment and the answer the player gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOrigin {
    pub question: String,
    pub choices: StoryChoice,
    pub chosen: ChoiceKey,
}

impl TurnOrigin {
    pub fn chosen_text(&self) -> &str {
        self.choices.option(self.chosen)
    }
}

/// One resolved story beat.
///
/// Only the history store hands out references to committed segments, and it
/// only mutates media and mini-game state; the text fields stay as created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeSegment {
    pub id: SegmentId,
    pub tone: PathTone,
    pub narrative_text: String,

    /// `None` for the opening segment.
    pub origin: Option<TurnOrigin>,

    pub follow_up_question: String,
    pub follow_up_choices: StoryChoice,

    pub prompts: MediaPrompts,
    pub media: SegmentMedia,
    pub mini_game: Option<MiniGame>,
}

impl NarrativeSegment {
    pub fn preceding_question(&self) -> Option<&str> {
        self.origin.as_ref().map(|origin| origin.question.as_str())
    }

    /// Media failures recorded on this segment, in display order.
    pub fn media_failures(&self) -> Vec<UserFacingError> {
        let failures = [
            ("Scene image", self.media.image.error()),
            ("Narration", self.media.narration.error()),
            ("Animation", self.media.animation.error()),
        ];

        failures
            .into_iter()
            .filter_map(|(what, error)| error.map(|message| UserFacingError::media(what, message)))
            .collect()
    }

    /// True while a mini-game on this segment still withholds the next question.
    pub fn is_gated(&self) -> bool {
        self.mini_game
            .as_ref()
            .is_some_and(|game| !game.is_solved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_alternates_from_the_previous_segment() {
        assert_eq!(PathTone::following(None, PathTone::Utopia), PathTone::Utopia);
        assert_eq!(
            PathTone::following(Some(PathTone::Utopia), PathTone::Utopia),
            PathTone::Dystopia
        );
        assert_eq!(
            PathTone::following(Some(PathTone::Dystopia), PathTone::Utopia),
            PathTone::Utopia
        );
    }

    #[test]
    fn stories_start_in_utopia_by_default() {
        assert_eq!(PathTone::default(), PathTone::Utopia);
        let tone: PathTone = serde_json::from_str(r#""dystopia""#).unwrap();
        assert_eq!(tone, PathTone::Dystopia);
    }

    #[test]
    fn segment_ids_render_with_prefix() {
        assert_eq!(SegmentId::new(3).to_string(), "seg-3");
    }

    #[test]
    fn media_failures_list_only_failed_fields() {
        let segment = NarrativeSegment {
            id: SegmentId::new(1),
            tone: PathTone::Dystopia,
            narrative_text: "Smoke over the river.".into(),
            origin: None,
            follow_up_question: "Run or hide?".into(),
            follow_up_choices: StoryChoice::new("Run", "Hide"),
            prompts: MediaPrompts::default(),
            media: SegmentMedia {
                image: MediaSlot::Failed("quota".into()),
                narration: MediaSlot::Pending,
                animation: AnimationState::Failed("timed out".into()),
            },
            mini_game: None,
        };

        let failures = segment.media_failures();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.kind == crate::error::FailureKind::Media));
        assert_eq!(failures[0].message, "Scene image could not be generated: quota");
        assert_eq!(failures[1].message, "Animation could not be generated: timed out");
    }

    #[test]
    fn choice_lookup_by_key() {
        let choices = StoryChoice::new("Open the gate", "Burn the map");
        assert_eq!(choices.option(ChoiceKey::A), "Open the gate");
        assert_eq!(choices.option(ChoiceKey::B), "Burn the map");
    }
}
