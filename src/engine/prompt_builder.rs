use serde_json::{json, Value};

use crate::engine::backend::SegmentRequest;
use crate::model::segment::PathTone;

/// Builds the text prompts sent to the generative models.
/// This struct only formats text: no parsing, no networking, no engine logic.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn story(request: &SegmentRequest) -> String {
        let mut prompt = String::new();

        push_storyteller_role(&mut prompt);
        push_summary(&mut prompt, &request.prior_summary);
        push_player_choice(&mut prompt, request.chosen_option.as_deref());
        push_task(&mut prompt, request.tone, request.hidden_object);
        push_tone_guide(&mut prompt);

        prompt
    }

    /// Instruction for the speech model around the narration text.
    pub fn narration(text: &str) -> String {
        format!("Narrate this passage like a storyteller by a fire: {}", text.trim())
    }

    pub fn scene_image(description: &str) -> String {
        format!(
            "Cinematic digital painting, wide 16:9 composition, no text or lettering. {}",
            description.trim()
        )
    }

    /// Response schema matching [`crate::model::response::NarrativeResponse`].
    pub fn story_schema(hidden_object: bool) -> Value {
        let mut properties = json!({
            "newWorldSummary": string_field("A new, very short (1 sentence) summary of the world state."),
            "storyResult": string_field("A 2-4 sentence narrative describing the outcome of the player's choice."),
            "newQuestion": string_field("A new, tense question for the player that presents a difficult choice."),
            "choiceA": string_field("The first choice (A) for the question."),
            "choiceB": string_field("The second choice (B) for the question."),
            "speechNarrationStory": string_field("The outcome rewritten to be read aloud."),
            "imageGenerationPrompt": string_field("A vivid visual description of the scene for an image model."),
            "animationDescription": string_field("A short description of motion to animate the scene."),
        });
        let mut required = vec![
            "newWorldSummary",
            "storyResult",
            "newQuestion",
            "choiceA",
            "choiceB",
            "speechNarrationStory",
            "imageGenerationPrompt",
            "animationDescription",
        ];

        if hidden_object {
            properties["hiddenObjectName"] =
                string_field("A small object visible somewhere in the scene image.");
            properties["hiddenObjectLocation"] = json!({
                "type": "STRING",
                "enum": crate::minigame::hidden_object::HiddenZone::ALL
                    .iter()
                    .map(|zone| zone.as_str())
                    .collect::<Vec<_>>(),
                "description": "Which cell of a 3x3 grid over the image contains the object.",
            });
            required.extend(["hiddenObjectName", "hiddenObjectLocation"]);
        }

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        })
    }
}

fn string_field(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

fn push_storyteller_role(prompt: &mut String) {
    prompt.push_str(
        "You are a master storyteller creating a branching narrative in a world that \
oscillates between utopia and dystopia. Your tone should match the current path.\n\n",
    );
}

fn push_summary(prompt: &mut String, summary: &str) {
    prompt.push_str("PREVIOUS WORLD SUMMARY:\n");
    prompt.push_str(summary.trim());
    prompt.push_str("\n\n");
}

fn push_player_choice(prompt: &mut String, choice: Option<&str>) {
    prompt.push_str("PLAYER'S LATEST CHOICE:\n");
    match choice {
        Some(choice) => prompt.push_str(choice.trim()),
        None => prompt.push_str("This is the very beginning of the story."),
    }
    prompt.push_str("\n\n");
}

fn push_task(prompt: &mut String, tone: PathTone, hidden_object: bool) {
    let path = tone.as_str();
    prompt.push_str(&format!("CURRENT PATH TO GENERATE: {}\n\n", path.to_uppercase()));
    prompt.push_str(&format!(
        "Continue the story along the {path} path, based on the summary and the choice. \
Fill every field of the JSON schema. The two choices must lead to genuinely different futures.\n"
    ));

    if hidden_object {
        prompt.push_str(
            "Hide one small, concrete object in the scene you describe for the image, \
name it, and say which cell of a 3x3 grid over the picture it sits in.\n",
        );
    }
    prompt.push('\n');
}

fn push_tone_guide(prompt: &mut String) {
    prompt.push_str(
        "A 'utopia' path should feel hopeful, serene or wondrous, even with tensions beneath. \
A 'dystopia' path should feel grim, oppressive or desperate.\n",
    );
}
