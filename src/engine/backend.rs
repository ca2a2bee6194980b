use async_trait::async_trait;

use crate::engine::animation::JobHandle;
use crate::error::GenerationError;
use crate::model::media::{AudioClip, SceneImage, VideoClip};
use crate::model::response::NarrativeResponse;
use crate::model::segment::PathTone;

/// Inputs for one story beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub prior_summary: String,
    /// `None` for the opening call.
    pub chosen_option: Option<String>,
    pub tone: PathTone,
    /// Ask the model to hide an object in the scene.
    pub hidden_object: bool,
}

/// The external generative service. Every call may fail independently.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn request_segment(
        &self,
        request: &SegmentRequest,
    ) -> Result<NarrativeResponse, GenerationError>;

    async fn request_narration_audio(&self, text: &str) -> Result<AudioClip, GenerationError>;

    async fn request_scene_image(&self, prompt: &str) -> Result<SceneImage, GenerationError>;

    async fn request_animation_start(
        &self,
        image: &SceneImage,
        motion_prompt: &str,
    ) -> Result<JobHandle, GenerationError>;

    async fn poll_animation_job(&self, handle: &JobHandle) -> Result<JobHandle, GenerationError>;

    async fn fetch_rendered_video(&self, uri: &str) -> Result<VideoClip, GenerationError>;
}
