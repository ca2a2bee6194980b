//! Single-slot narration playback.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PlaybackError;
use crate::model::media::AudioClip;
use crate::model::segment::SegmentId;

/// Decoded mono samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn decode_pcm16(clip: &AudioClip) -> Result<PcmClip, PlaybackError> {
    if clip.pcm.is_empty() {
        return Err(PlaybackError::Decode("clip is empty".into()));
    }
    if clip.pcm.len() % 2 != 0 {
        return Err(PlaybackError::Decode(format!(
            "odd byte count {} for 16-bit samples",
            clip.pcm.len()
        )));
    }

    let samples = clip
        .pcm
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    Ok(PcmClip {
        samples,
        sample_rate: clip.sample_rate(),
    })
}

pub type FinishedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A device that can play one clip and report when it ran out.
pub trait AudioOutput {
    fn start(
        &mut self,
        clip: PcmClip,
        on_finished: FinishedCallback,
    ) -> Result<Box<dyn ActivePlayback>, PlaybackError>;
}

pub trait ActivePlayback {
    /// Stops output. The finished callback must not fire afterwards.
    fn stop(&mut self);
}

/// Identifies one start of playback so late completions can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTicket {
    pub segment: SegmentId,
    pub serial: u64,
}

struct ActiveSlot {
    ticket: PlaybackTicket,
    playback: Box<dyn ActivePlayback>,
}

pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    notify_finished: Arc<dyn Fn(PlaybackTicket) + Send + Sync>,
    active: Option<ActiveSlot>,
    next_serial: u64,
}

impl PlaybackController {
    pub fn new(
        output: Box<dyn AudioOutput>,
        notify_finished: Arc<dyn Fn(PlaybackTicket) + Send + Sync>,
    ) -> Self {
        Self {
            output,
            notify_finished,
            active: None,
            next_serial: 0,
        }
    }

    /// Plays `clip` for `segment`, or stops it if it is already playing.
    /// Whatever else was playing is stopped first.
    ///
    /// Returns the segment that is active afterwards.
    pub fn toggle(&mut self, segment: &SegmentId, clip: &AudioClip) -> Option<SegmentId> {
        let was_active = self.active_segment() == Some(segment);
        self.stop();
        if was_active {
            return None;
        }

        let pcm = match decode_pcm16(clip) {
            Ok(pcm) => pcm,
            Err(err) => {
                warn!(%segment, %err, "narration could not be decoded");
                return None;
            }
        };

        self.next_serial += 1;
        let ticket = PlaybackTicket {
            segment: segment.clone(),
            serial: self.next_serial,
        };

        let notify = Arc::clone(&self.notify_finished);
        let finished_ticket = ticket.clone();
        let on_finished: FinishedCallback = Box::new(move || notify(finished_ticket));

        match self.output.start(pcm, on_finished) {
            Ok(playback) => {
                debug!(%segment, serial = ticket.serial, "narration started");
                self.active = Some(ActiveSlot { ticket, playback });
                Some(segment.clone())
            }
            Err(err) => {
                warn!(%segment, %err, "narration could not be played");
                None
            }
        }
    }

    /// Natural end of a clip. Ignored unless `ticket` is still the active one.
    pub fn finished(&mut self, ticket: &PlaybackTicket) -> bool {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|slot| &slot.ticket == ticket);

        if is_current {
            debug!(segment = %ticket.segment, "narration finished");
            self.active = None;
        }
        is_current
    }

    pub fn stop(&mut self) {
        if let Some(mut slot) = self.active.take() {
            slot.playback.stop();
        }
    }

    pub fn active_segment(&self) -> Option<&SegmentId> {
        self.active.as_ref().map(|slot| &slot.ticket.segment)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}
