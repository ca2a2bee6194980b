//! In-memory generation backend driven by per-call scripts.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use utopia_dystopia::engine::animation::JobHandle;
use utopia_dystopia::engine::backend::{GenerationBackend, SegmentRequest};
use utopia_dystopia::engine::credentials::CredentialProvider;
use utopia_dystopia::error::GenerationError;
use utopia_dystopia::model::media::{AudioClip, SceneImage, VideoClip};
use utopia_dystopia::model::response::NarrativeResponse;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Segment(SegmentRequest),
    Narration(String),
    Image(String),
    AnimationStart(String),
    Poll(String),
    Fetch(String),
}

type Script<T> = Mutex<VecDeque<Result<T, GenerationError>>>;

/// Backend whose answers are queued up front.
///
/// Empty queues fall back to a successful default, except animation polls,
/// which keep reporting a running job.
#[derive(Default)]
pub struct ScriptedBackend {
    segments: Script<NarrativeResponse>,
    images: Script<SceneImage>,
    image_delays: Mutex<VecDeque<Duration>>,
    narrations: Script<AudioClip>,
    animation_starts: Script<JobHandle>,
    polls: Script<JobHandle>,
    videos: Script<VideoClip>,
    panic_next_poll: Mutex<bool>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    calls: Mutex<Vec<Call>>,
}

pub fn story(result: &str, question: &str, a: &str, b: &str) -> NarrativeResponse {
    NarrativeResponse {
        new_world_summary: format!("After: {result}"),
        story_result: result.to_string(),
        new_question: question.to_string(),
        choice_a: a.to_string(),
        choice_b: b.to_string(),
        speech_narration_story: format!("Listen. {result}"),
        image_generation_prompt: format!("Painting of {result}"),
        animation_description: "Slow pan".to_string(),
        hidden_object_name: None,
        hidden_object_location: None,
    }
}

pub fn with_hidden_object(mut response: NarrativeResponse, name: &str, zone: &str) -> NarrativeResponse {
    response.hidden_object_name = Some(name.to_string());
    response.hidden_object_location = Some(zone.to_string());
    response
}

pub fn image(tag: u8) -> SceneImage {
    SceneImage::new(vec![0x89, b'P', b'N', b'G', tag], "image/png")
}

pub fn narration() -> AudioClip {
    AudioClip::new(vec![0, 0, 0, 64, 0, 192, 0, 0], "audio/L16;codec=pcm;rate=24000")
}

pub fn running_job() -> JobHandle {
    JobHandle {
        name: "operations/test".into(),
        ..JobHandle::default()
    }
}

pub fn finished_job(uri: Option<&str>) -> JobHandle {
    JobHandle {
        name: "operations/test".into(),
        done: true,
        error: None,
        video_uri: uri.map(str::to_string),
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `MissingCredential` while `credentials` holds no key.
    pub fn requiring_key(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn push_segment(&self, result: Result<NarrativeResponse, GenerationError>) {
        self.segments.lock().unwrap().push_back(result);
    }

    pub fn push_image(&self, result: Result<SceneImage, GenerationError>) {
        self.images.lock().unwrap().push_back(result);
    }

    /// Delays the next image call. Calls after it are not delayed.
    pub fn delay_next_image(&self, delay: Duration) {
        self.image_delays.lock().unwrap().push_back(delay);
    }

    pub fn push_narration(&self, result: Result<AudioClip, GenerationError>) {
        self.narrations.lock().unwrap().push_back(result);
    }

    pub fn push_animation_start(&self, result: Result<JobHandle, GenerationError>) {
        self.animation_starts.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<JobHandle, GenerationError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    /// Makes the next status check panic inside the backend.
    pub fn panic_on_next_poll(&self) {
        *self.panic_next_poll.lock().unwrap() = true;
    }

    pub fn push_video(&self, result: Result<VideoClip, GenerationError>) {
        self.videos.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| matches(call)).count()
    }

    pub fn segment_requests(&self) -> Vec<SegmentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Segment(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<(), GenerationError> {
        self.calls.lock().unwrap().push(call);
        match &self.credentials {
            Some(credentials) if !credentials.has_credential() => {
                Err(GenerationError::MissingCredential)
            }
            _ => Ok(()),
        }
    }

    fn next<T>(script: &Script<T>, fallback: impl FnOnce() -> Result<T, GenerationError>) -> Result<T, GenerationError> {
        let scripted = script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(fallback)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn request_segment(
        &self,
        request: &SegmentRequest,
    ) -> Result<NarrativeResponse, GenerationError> {
        self.record(Call::Segment(request.clone()))?;
        Self::next(&self.segments, || {
            Ok(story("The story goes on.", "What next?", "Onward", "Back"))
        })
    }

    async fn request_narration_audio(&self, text: &str) -> Result<AudioClip, GenerationError> {
        self.record(Call::Narration(text.to_string()))?;
        Self::next(&self.narrations, || Ok(narration()))
    }

    async fn request_scene_image(&self, prompt: &str) -> Result<SceneImage, GenerationError> {
        self.record(Call::Image(prompt.to_string()))?;
        // Results are taken in call order, even when a later call finishes first.
        let delay = self.image_delays.lock().unwrap().pop_front();
        let result = Self::next(&self.images, || Ok(image(0)));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn request_animation_start(
        &self,
        _image: &SceneImage,
        motion_prompt: &str,
    ) -> Result<JobHandle, GenerationError> {
        self.record(Call::AnimationStart(motion_prompt.to_string()))?;
        Self::next(&self.animation_starts, || Ok(running_job()))
    }

    async fn poll_animation_job(&self, handle: &JobHandle) -> Result<JobHandle, GenerationError> {
        self.record(Call::Poll(handle.name.clone()))?;
        let panic_now = std::mem::take(&mut *self.panic_next_poll.lock().unwrap());
        if panic_now {
            panic!("status check blew up");
        }
        Self::next(&self.polls, || Ok(running_job()))
    }

    async fn fetch_rendered_video(&self, uri: &str) -> Result<VideoClip, GenerationError> {
        self.record(Call::Fetch(uri.to_string()))?;
        Self::next(&self.videos, || Ok(VideoClip::new(vec![0, 0, 0, 32], "video/mp4")))
    }
}
