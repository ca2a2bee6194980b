use std::collections::HashMap;

use crate::minigame::MiniGame;
use crate::model::media::{AudioClip, SceneImage};
use crate::model::segment::{AnimationState, MediaSlot, NarrativeSegment, SegmentId};

/// A late-arriving update to one media field of a committed segment.
///
/// Each variant touches a single field, so patches from independent producers
/// can land in any order.
#[derive(Debug, Clone)]
pub enum SegmentPatch {
    Image(MediaSlot<SceneImage>),
    Narration(MediaSlot<AudioClip>),
    Animation(AnimationState),
}

/// Ordered, append-only log of story segments with an id index.
#[derive(Debug, Default)]
pub struct HistoryLog {
    segments: Vec<NarrativeSegment>,
    index: HashMap<SegmentId, usize>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and leaves the log untouched if the id is already present.
    pub fn append(&mut self, segment: NarrativeSegment) -> bool {
        if self.index.contains_key(&segment.id) {
            return false;
        }

        self.index.insert(segment.id.clone(), self.segments.len());
        self.segments.push(segment);
        true
    }

    /// Applies `patch` to the segment with `id`. Unknown ids are ignored.
    pub fn patch(&mut self, id: &SegmentId, patch: SegmentPatch) -> bool {
        let Some(segment) = self.segment_mut(id) else {
            return false;
        };

        match patch {
            SegmentPatch::Image(slot) => segment.media.image = slot,
            SegmentPatch::Narration(slot) => segment.media.narration = slot,
            SegmentPatch::Animation(state) => segment.media.animation = state,
        }

        true
    }

    pub fn mini_game_mut(&mut self, id: &SegmentId) -> Option<&mut MiniGame> {
        self.segment_mut(id)?.mini_game.as_mut()
    }

    pub fn reset(&mut self) {
        self.segments.clear();
        self.index.clear();
    }

    pub fn get(&self, id: &SegmentId) -> Option<&NarrativeSegment> {
        self.index.get(id).map(|&position| &self.segments[position])
    }

    pub fn contains(&self, id: &SegmentId) -> bool {
        self.index.contains_key(id)
    }

    pub fn last(&self) -> Option<&NarrativeSegment> {
        self.segments.last()
    }

    pub fn is_latest(&self, id: &SegmentId) -> bool {
        self.last().is_some_and(|segment| &segment.id == id)
    }

    pub fn segments(&self) -> &[NarrativeSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn segment_mut(&mut self, id: &SegmentId) -> Option<&mut NarrativeSegment> {
        let position = *self.index.get(id)?;
        self.segments.get_mut(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::segment::{MediaPrompts, PathTone, SegmentMedia, StoryChoice};

    fn segment(sequence: u64, tone: PathTone) -> NarrativeSegment {
        NarrativeSegment {
            id: SegmentId::new(sequence),
            tone,
            narrative_text: format!("beat {sequence}"),
            origin: None,
            follow_up_question: "What now?".into(),
            follow_up_choices: StoryChoice::new("left", "right"),
            prompts: MediaPrompts::default(),
            media: SegmentMedia {
                image: MediaSlot::Pending,
                narration: MediaSlot::Pending,
                animation: AnimationState::NotStarted,
            },
            mini_game: None,
        }
    }

    #[test]
    fn append_keeps_order_and_rejects_duplicate_ids() {
        let mut log = HistoryLog::new();
        assert!(log.append(segment(0, PathTone::Utopia)));
        assert!(log.append(segment(1, PathTone::Dystopia)));
        assert!(!log.append(segment(1, PathTone::Utopia)));

        assert_eq!(log.len(), 2);
        assert!(log.is_latest(&SegmentId::new(1)));
        assert_eq!(log.segments()[0].id, SegmentId::new(0));
    }

    #[test]
    fn patches_touch_only_their_field() {
        let mut log = HistoryLog::new();
        log.append(segment(0, PathTone::Utopia));
        let id = SegmentId::new(0);

        let image = SceneImage::new(vec![1, 2, 3], "image/png");
        assert!(log.patch(&id, SegmentPatch::Image(MediaSlot::Ready(image.clone()))));
        assert!(log.patch(
            &id,
            SegmentPatch::Narration(MediaSlot::Failed("tts offline".into()))
        ));
        assert!(log.patch(&id, SegmentPatch::Animation(AnimationState::Submitted)));

        let patched = log.get(&id).unwrap();
        assert_eq!(patched.media.image, MediaSlot::Ready(image));
        assert_eq!(patched.media.narration.error(), Some("tts offline"));
        assert_eq!(patched.media.animation, AnimationState::Submitted);
        assert_eq!(patched.narrative_text, "beat 0");
        assert_eq!(patched.follow_up_question, "What now?");
    }

    #[test]
    fn patch_on_unknown_id_is_a_no_op() {
        let mut log = HistoryLog::new();
        log.append(segment(4, PathTone::Utopia));
        let before = log.segments().to_vec();

        assert!(!log.patch(
            &SegmentId::new(3),
            SegmentPatch::Image(MediaSlot::Failed("late".into()))
        ));
        assert_eq!(log.segments(), before.as_slice());
    }

    #[test]
    fn reset_forgets_every_id() {
        let mut log = HistoryLog::new();
        log.append(segment(0, PathTone::Utopia));
        log.append(segment(1, PathTone::Dystopia));
        log.reset();

        assert!(log.is_empty());
        assert!(!log.contains(&SegmentId::new(0)));
        assert!(!log.patch(
            &SegmentId::new(1),
            SegmentPatch::Animation(AnimationState::Submitted)
        ));
        assert!(log.last().is_none());
    }
}
