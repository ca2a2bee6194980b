use eframe::egui;
use egui::{Color32, RichText};
use std::path::Path;
use tracing::{info, warn};

use crate::config::AnimationMode;
use crate::engine::protocol::{EngineCommand, StorySnapshot};
use crate::minigame::MiniGame;
use crate::model::media::VideoClip;
use crate::model::segment::{AnimationState, MediaSlot, NarrativeSegment};
use crate::ui::minigame_view::{draw_hidden_object, draw_jigsaw, GameUiState};
use crate::ui::settings::{capitalized, UiSettings};
use crate::ui::textures::SceneTextures;

const ERROR_TEXT: Color32 = Color32::from_rgb(255, 150, 150);

/// Mutable pieces of UI state the story column draws into.
pub struct StoryView<'a> {
    pub settings: &'a UiSettings,
    pub textures: &'a mut SceneTextures,
    pub game: &'a mut GameUiState,
    pub notice: &'a mut Option<String>,
    pub commands: &'a mut Vec<EngineCommand>,
}

pub fn draw_story_panel(
    ctx: &egui::Context,
    snapshot: &StorySnapshot,
    view: &mut StoryView<'_>,
    stick_to_bottom: bool,
) {
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(stick_to_bottom)
            .show(ui, |ui| {
                if snapshot.segments.is_empty() && !snapshot.loading {
                    ui.add_space(24.0);
                    ui.vertical_centered(|ui| {
                        ui.label("Press Restart to begin a new story.");
                    });
                }

                let latest = snapshot.segments.len().saturating_sub(1);
                for (index, segment) in snapshot.segments.iter().enumerate() {
                    ui.add_space(8.0);
                    draw_segment(ui, snapshot, segment, index == latest, view);
                }
            });
    });
}

fn draw_segment(
    ui: &mut egui::Ui,
    snapshot: &StorySnapshot,
    segment: &NarrativeSegment,
    is_latest: bool,
    view: &mut StoryView<'_>,
) {
    egui::Frame::new()
        .fill(view.settings.color(segment.tone))
        .corner_radius(egui::CornerRadius::same(8))
        .inner_margin(egui::Margin::symmetric(12, 10))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());

            ui.label(
                RichText::new(capitalized(segment.tone.as_str()))
                    .small()
                    .color(Color32::from_white_alpha(160)),
            );

            if let Some(origin) = &segment.origin {
                ui.label(
                    RichText::new(format!("{} → {}", origin.question, origin.chosen_text()))
                        .italics()
                        .color(Color32::from_white_alpha(200)),
                );
            }

            ui.add_space(4.0);
            ui.label(RichText::new(&segment.narrative_text).color(Color32::WHITE));
            ui.add_space(6.0);

            draw_narration(ui, snapshot, segment, view);
            draw_scene(ui, segment, is_latest, view);
            draw_animation(ui, snapshot, segment, view);

            for failure in segment.media_failures() {
                ui.label(RichText::new(failure.message).small().color(ERROR_TEXT));
            }
        });
}

fn draw_narration(
    ui: &mut egui::Ui,
    snapshot: &StorySnapshot,
    segment: &NarrativeSegment,
    view: &mut StoryView<'_>,
) {
    match &segment.media.narration {
        MediaSlot::Disabled | MediaSlot::Failed(_) => {}
        MediaSlot::Pending => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Recording narration…");
            });
        }
        MediaSlot::Ready(_) => {
            let playing = snapshot.active_playback.as_ref() == Some(&segment.id);
            let label = if playing { "⏹ Stop narration" } else { "▶ Listen" };
            if ui.button(label).clicked() {
                view.commands
                    .push(EngineCommand::TogglePlayback(segment.id.clone()));
            }
        }
    }
}

fn draw_scene(
    ui: &mut egui::Ui,
    segment: &NarrativeSegment,
    is_latest: bool,
    view: &mut StoryView<'_>,
) {
    if let Some(game) = segment.mini_game.as_ref().filter(|game| !game.is_solved()) {
        // Only the latest segment keeps per-frame selection state.
        let mut scratch = GameUiState::default();
        let state = if is_latest { &mut *view.game } else { &mut scratch };

        let command = match game {
            MiniGame::HiddenObject(game) => draw_hidden_object(ui, view.textures, segment, game, state),
            MiniGame::Jigsaw(game) => draw_jigsaw(ui, view.textures, segment, game, state),
        };
        view.commands.extend(command);
        return;
    }

    match &segment.media.image {
        MediaSlot::Disabled | MediaSlot::Failed(_) => {}
        MediaSlot::Pending => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Painting the scene…");
            });
        }
        MediaSlot::Ready(image) => {
            if let Some(texture) = view.textures.scene(ui.ctx(), &segment.id, image) {
                let size = texture.size_vec2();
                let width = ui.available_width().min(720.0);
                ui.add(egui::Image::new((texture.id(), size * (width / size.x.max(1.0)))));
            }
        }
    }
}

fn draw_animation(
    ui: &mut egui::Ui,
    snapshot: &StorySnapshot,
    segment: &NarrativeSegment,
    view: &mut StoryView<'_>,
) {
    if snapshot.features.animation == AnimationMode::Off
        || segment.media.image.ready().is_none()
        || segment.is_gated()
    {
        return;
    }

    let request = EngineCommand::RequestAnimation(segment.id.clone());

    match &segment.media.animation {
        _ if snapshot.is_animating(&segment.id) && !segment.media.animation.is_running() => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Sending the scene to the animator…");
            });
        }
        AnimationState::NotStarted => {
            if snapshot.features.animation == AnimationMode::OnDemand
                && ui.button("Animate scene").clicked()
            {
                view.commands.push(request);
            }
        }
        AnimationState::Submitted => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Animation submitted…");
            });
        }
        AnimationState::Polling { checks } => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(format!("Rendering animation… (status check {checks})"));
            });
        }
        AnimationState::Done(video) => {
            ui.horizontal(|ui| {
                ui.label("Animation ready.");
                if ui.button("Save video…").clicked() {
                    *view.notice = Some(save_video(segment, video));
                }
            });
        }
        AnimationState::Failed(_) => {
            if ui.button("Try animating again").clicked() {
                view.commands.push(request);
            }
        }
    }
}

fn save_video(segment: &NarrativeSegment, video: &VideoClip) -> String {
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(format!("{}.mp4", segment.id))
        .add_filter("MP4 video", &["mp4"])
        .save_file()
    else {
        return "Save cancelled.".to_string();
    };

    write_video(&path, video)
}

fn write_video(path: &Path, video: &VideoClip) -> String {
    match std::fs::write(path, &video.bytes) {
        Ok(()) => {
            info!(path = %path.display(), bytes = video.bytes.len(), "video saved");
            format!("Saved video to {}", path.display())
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "could not save video");
            format!("Could not save video: {err}")
        }
    }
}
