//! Google Generative Language REST client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::BackendConfig;
use crate::engine::animation::JobHandle;
use crate::engine::backend::{GenerationBackend, SegmentRequest};
use crate::engine::credentials::CredentialProvider;
use crate::engine::prompt_builder::PromptBuilder;
use crate::error::GenerationError;
use crate::model::media::{AudioClip, SceneImage, VideoClip};
use crate::model::response::NarrativeResponse;

const KEY_HEADER: &str = "x-goog-api-key";

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Deserialize)]
struct OperationError {
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

impl From<Operation> for JobHandle {
    fn from(operation: Operation) -> Self {
        let video_uri = operation
            .response
            .and_then(|response| response.generate_video_response)
            .and_then(|video| video.generated_samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| video.uri);

        JobHandle {
            name: operation.name,
            done: operation.done,
            error: operation
                .error
                .map(|error| error.message.unwrap_or_default()),
            video_uri,
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    config: BackendConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl GeminiClient {
    pub fn new(config: BackendConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            config,
            credentials,
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, GenerationError> {
        let key = self
            .credentials
            .api_key()
            .ok_or(GenerationError::MissingCredential)?;
        Ok(request.header(KEY_HEADER, key))
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T, GenerationError> {
        let request = self.authorized(self.http.post(url).json(body))?;
        read_json(request).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GenerationError> {
        let request = self.authorized(self.http.get(url))?;
        read_json(request).await
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<Vec<Part>, GenerationError> {
        let url = self.model_url(model, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &body).await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| GenerationError::Malformed("response contained no candidates".into()))
    }
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(GenerationError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    response
        .json()
        .await
        .map_err(|e| GenerationError::Malformed(e.to_string()))
}

/// Pulls `error.message` out of a Google error body, or returns the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn decode_base64(data: &str) -> Result<Vec<u8>, GenerationError> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| GenerationError::Malformed(format!("base64 payload: {e}")))
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    #[instrument(skip(self, request), fields(tone = %request.tone))]
    async fn request_segment(
        &self,
        request: &SegmentRequest,
    ) -> Result<NarrativeResponse, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": PromptBuilder::story(request) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": PromptBuilder::story_schema(request.hidden_object),
                "temperature": 0.9,
            },
        });

        let parts = self.generate_content(&self.config.text_model, body).await?;
        let text: String = parts.into_iter().filter_map(|part| part.text).collect();
        debug!(bytes = text.len(), "story payload received");
        NarrativeResponse::from_json(&text)
    }

    #[instrument(skip(self, text))]
    async fn request_narration_audio(&self, text: &str) -> Result<AudioClip, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": PromptBuilder::narration(text) }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.config.tts_voice } },
                },
            },
        });

        let parts = self.generate_content(&self.config.tts_model, body).await?;
        let audio = parts
            .into_iter()
            .find_map(|part| part.inline_data)
            .ok_or_else(|| GenerationError::Malformed("speech response carried no audio".into()))?;

        Ok(AudioClip::new(decode_base64(&audio.data)?, audio.mime_type))
    }

    #[instrument(skip(self, prompt))]
    async fn request_scene_image(&self, prompt: &str) -> Result<SceneImage, GenerationError> {
        let body = json!({
            "instances": [{ "prompt": PromptBuilder::scene_image(prompt) }],
            "parameters": { "sampleCount": 1, "aspectRatio": "16:9" },
        });

        let url = self.model_url(&self.config.image_model, "predict");
        let response: PredictResponse = self.post_json(&url, &body).await?;
        let prediction = response
            .predictions
            .into_iter()
            .find(|prediction| prediction.bytes_base64_encoded.is_some())
            .ok_or_else(|| GenerationError::Malformed("image response carried no image".into()))?;

        let bytes = decode_base64(prediction.bytes_base64_encoded.as_deref().unwrap_or_default())?;
        let mime_type = prediction.mime_type.unwrap_or_else(|| "image/png".into());
        Ok(SceneImage::new(bytes, mime_type))
    }

    #[instrument(skip(self, image, motion_prompt))]
    async fn request_animation_start(
        &self,
        image: &SceneImage,
        motion_prompt: &str,
    ) -> Result<JobHandle, GenerationError> {
        let body = json!({
            "instances": [{
                "prompt": motion_prompt,
                "image": {
                    "bytesBase64Encoded": STANDARD.encode(&image.bytes),
                    "mimeType": image.mime_type,
                },
            }],
            "parameters": { "aspectRatio": "16:9" },
        });

        let url = self.model_url(&self.config.video_model, "predictLongRunning");
        let operation: Operation = self.post_json(&url, &body).await?;
        Ok(operation.into())
    }

    #[instrument(skip(self), fields(job = %handle.name))]
    async fn poll_animation_job(&self, handle: &JobHandle) -> Result<JobHandle, GenerationError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            handle.name.trim_start_matches('/')
        );
        let operation: Operation = self.get_json(&url).await?;
        Ok(operation.into())
    }

    #[instrument(skip(self, uri))]
    async fn fetch_rendered_video(&self, uri: &str) -> Result<VideoClip, GenerationError> {
        let request = self.authorized(self.http.get(uri))?;
        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(VideoClip::new(bytes.to_vec(), "video/mp4"))
    }
}
