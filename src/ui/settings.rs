use eframe::egui;
use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::config::{load_json, save_json};
use crate::model::segment::PathTone;

const SETTINGS_FILE: &str = "ui_settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub ui_scale: f32,

    // Tone → card color
    pub tone_colors: HashMap<PathTone, [u8; 4]>,
}

impl Default for UiSettings {
    fn default() -> Self {
        let mut tone_colors = HashMap::new();

        tone_colors.insert(PathTone::Utopia, [36, 92, 84, 255]);
        tone_colors.insert(PathTone::Dystopia, [96, 40, 44, 255]);

        Self {
            ui_scale: 1.0,
            tone_colors,
        }
    }
}

impl UiSettings {
    pub fn load() -> Self {
        let mut settings: UiSettings = load_json(SETTINGS_FILE);
        settings.ui_scale = settings.ui_scale.clamp(0.75, 2.0);
        settings
    }

    pub fn save(&self) {
        if let Err(err) = save_json(SETTINGS_FILE, self) {
            warn!(%err, "could not save UI settings");
        }
    }

    pub fn color(&self, tone: PathTone) -> Color32 {
        self.tone_colors
            .get(&tone)
            .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
            .unwrap_or(Color32::DARK_GRAY)
    }

    pub fn set_color(&mut self, tone: PathTone, color: Color32) {
        self.tone_colors
            .insert(tone, [color.r(), color.g(), color.b(), color.a()]);
    }
}

/// Scale and tone colors. Saved when the window is closed.
pub fn draw_settings_window(ctx: &egui::Context, open: &mut bool, settings: &mut UiSettings) {
    let was_open = *open;

    egui::Window::new("Settings")
        .open(open)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.label("UI Scale");
            ui.add(egui::Slider::new(&mut settings.ui_scale, 0.75..=2.0));

            ui.separator();

            for tone in [PathTone::Utopia, PathTone::Dystopia] {
                ui.horizontal(|ui| {
                    let mut color = settings.color(tone);
                    if ui.color_edit_button_srgba(&mut color).changed() {
                        settings.set_color(tone, color);
                    }
                    ui.label(format!("{} cards", capitalized(tone.as_str())));
                });
            }

            ui.separator();

            if ui.button("Reset to defaults").clicked() {
                *settings = UiSettings::default();
            }
        });

    if was_open && !*open {
        settings.save();
    }
}

pub(crate) fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_colors_round_trip_through_json() {
        let mut settings = UiSettings::default();
        settings.set_color(PathTone::Dystopia, Color32::from_rgb(1, 2, 3));

        let json = serde_json::to_string(&settings).unwrap();
        let restored: UiSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.color(PathTone::Dystopia), Color32::from_rgb(1, 2, 3));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: UiSettings = serde_json::from_str(r#"{ "ui_scale": 1.5 }"#).unwrap();
        assert_eq!(settings.ui_scale, 1.5);
        assert_eq!(settings.color(PathTone::Utopia), Color32::from_rgb(36, 92, 84));
    }

    #[test]
    fn capitalizes_tone_names() {
        assert_eq!(capitalized("utopia"), "Utopia");
        assert_eq!(capitalized(""), "");
    }
}
