use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GenerationError;
use crate::minigame::hidden_object::HiddenZone;
use crate::model::segment::StoryChoice;

/// Structured story payload returned by the text model.
///
/// Field names follow the JSON schema sent with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeResponse {
    #[serde(default)]
    pub new_world_summary: String,
    pub story_result: String,
    pub new_question: String,
    pub choice_a: String,
    pub choice_b: String,

    #[serde(default)]
    pub speech_narration_story: String,
    #[serde(default)]
    pub image_generation_prompt: String,
    #[serde(default)]
    pub animation_description: String,

    #[serde(default)]
    pub hidden_object_name: Option<String>,
    #[serde(default)]
    pub hidden_object_location: Option<String>,
}

/// The object the player has to find and where it hides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenObjectTarget {
    pub name: String,
    pub zone: HiddenZone,
}

impl NarrativeResponse {
    /// Parses the model's JSON text and checks the required fields.
    pub fn from_json(text: &str) -> Result<Self, GenerationError> {
        let response: NarrativeResponse = serde_json::from_str(text.trim())
            .map_err(|e| GenerationError::Malformed(format!("story payload: {e}")))?;
        response.validate()
    }

    pub fn validate(self) -> Result<Self, GenerationError> {
        let required = [
            ("storyResult", &self.story_result),
            ("newQuestion", &self.new_question),
            ("choiceA", &self.choice_a),
            ("choiceB", &self.choice_b),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(GenerationError::Malformed(format!(
                    "story payload field `{field}` is empty"
                )));
            }
        }

        Ok(self)
    }

    pub fn choices(&self) -> StoryChoice {
        StoryChoice::new(self.choice_a.trim(), self.choice_b.trim())
    }

    /// Text for the narrator, falling back to the outcome itself.
    pub fn narration_text(&self) -> &str {
        non_blank(&self.speech_narration_story).unwrap_or(&self.story_result)
    }

    pub fn image_prompt(&self) -> &str {
        non_blank(&self.image_generation_prompt).unwrap_or(&self.story_result)
    }

    pub fn animation_prompt(&self) -> &str {
        non_blank(&self.animation_description).unwrap_or("Gentle ambient motion across the scene.")
    }

    /// `None` when the payload names no object. An unknown location is
    /// corrected to the center cell.
    pub fn hidden_object(&self) -> Option<HiddenObjectTarget> {
        let name = non_blank(self.hidden_object_name.as_deref()?)?;

        let raw_zone = self.hidden_object_location.as_deref().unwrap_or_default();
        let zone = HiddenZone::parse(raw_zone).unwrap_or_else(|| {
            warn!(location = raw_zone, "unknown hidden object location; using center");
            HiddenZone::default()
        });

        Some(HiddenObjectTarget {
            name: name.to_string(),
            zone,
        })
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
