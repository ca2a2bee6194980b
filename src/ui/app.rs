use anyhow::{anyhow, Context as _};
use eframe::egui;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::engine::audio_output::default_output;
use crate::engine::backend::GenerationBackend;
use crate::engine::credentials::{CredentialProvider, SharedCredential};
use crate::engine::engine::Engine;
use crate::engine::gemini::GeminiClient;
use crate::engine::protocol::{EngineCommand, EngineResponse, StorySnapshot};
use crate::error::FailureKind;
use crate::minigame::MiniGame;
use crate::model::segment::{ChoiceKey, SegmentId};
use crate::ui::minigame_view::GameUiState;
use crate::ui::settings::{draw_settings_window, UiSettings};
use crate::ui::story_panel::{draw_story_panel, StoryView};
use crate::ui::textures::SceneTextures;

/* =========================
   UI State
   ========================= */

#[derive(Default)]
struct UiState {
    snapshot: StorySnapshot,
    key_input: String,
    show_settings: bool,
    should_auto_scroll: bool,
    notice: Option<String>,

    /// Segment the mini-game selection state belongs to.
    game_segment: Option<SegmentId>,
    game: GameUiState,
}

/* =========================
   App
   ========================= */

pub struct StoryApp {
    ui: UiState,
    settings: UiSettings,
    textures: SceneTextures,

    cmd_tx: UnboundedSender<EngineCommand>,
    resp_rx: mpsc::Receiver<EngineResponse>,
    engine_thread: Option<JoinHandle<()>>,
}

impl StoryApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        settings: UiSettings,
    ) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::channel();

        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(SharedCredential::new(config.api_key.clone()));
        let backend: Arc<dyn GenerationBackend> = Arc::new(GeminiClient::new(
            config.backend.clone(),
            Arc::clone(&credentials),
        ));
        let engine_config = config.engine_config();
        let ctx = cc.egui_ctx.clone();

        let engine_thread = std::thread::Builder::new()
            .name("story-engine".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!(%err, "could not build the engine runtime");
                        return;
                    }
                };

                let engine = Engine::new(
                    backend,
                    credentials,
                    default_output(),
                    engine_config,
                    cmd_rx,
                    resp_tx,
                )
                .with_repaint(Arc::new(move || ctx.request_repaint()));

                runtime.block_on(engine.run());
            })
            .context("could not spawn the engine thread")?;

        cmd_tx
            .send(EngineCommand::Start)
            .map_err(|_| anyhow!("the engine stopped before the story began"))?;

        Ok(Self {
            ui: UiState::default(),
            settings,
            textures: SceneTextures::default(),
            cmd_tx,
            resp_rx,
            engine_thread: Some(engine_thread),
        })
    }

    fn send_command(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            warn!("engine is gone; command dropped");
        }
    }

    fn apply_snapshot(&mut self, snapshot: StorySnapshot) {
        if snapshot.segments.len() != self.ui.snapshot.segments.len() {
            self.ui.should_auto_scroll = true;
        }

        let latest = snapshot.segments.last().map(|segment| segment.id.clone());
        if latest != self.ui.game_segment {
            self.ui.game_segment = latest;
            self.ui.game = GameUiState::default();
        }

        let live: Vec<SegmentId> = snapshot.segments.iter().map(|s| s.id.clone()).collect();
        self.textures.retain(&live);

        self.ui.snapshot = snapshot;
    }
}

/* =========================
   egui App
   ========================= */

impl eframe::App for StoryApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.settings.ui_scale);

        while let Ok(resp) = self.resp_rx.try_recv() {
            match resp {
                EngineResponse::Snapshot(snapshot) => self.apply_snapshot(*snapshot),
            }
        }

        let mut commands = Vec::new();

        draw_top_panel(ctx, &mut self.ui, &mut commands);
        draw_choice_panel(ctx, &self.ui.snapshot, &mut commands);

        let mut view = StoryView {
            settings: &self.settings,
            textures: &mut self.textures,
            game: &mut self.ui.game,
            notice: &mut self.ui.notice,
            commands: &mut commands,
        };
        draw_story_panel(ctx, &self.ui.snapshot, &mut view, self.ui.should_auto_scroll);
        self.ui.should_auto_scroll = false;

        draw_settings_window(ctx, &mut self.ui.show_settings, &mut self.settings);

        for command in commands {
            self.send_command(command);
        }
    }
}

impl Drop for StoryApp {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.engine_thread.take() {
            if thread.join().is_err() {
                error!("engine thread panicked");
            }
        }
    }
}

/* =========================
   Panels
   ========================= */

fn draw_top_panel(ctx: &egui::Context, state: &mut UiState, commands: &mut Vec<EngineCommand>) {
    egui::TopBottomPanel::top("header").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("Utopia / Dystopia");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Settings").clicked() {
                    state.show_settings = !state.show_settings;
                }
                if ui.button("Restart").clicked() {
                    state.notice = None;
                    commands.push(EngineCommand::Start);
                }
            });
        });

        if !state.snapshot.has_credential {
            ui.separator();
            ui.horizontal(|ui| {
                ui.label("API key:");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut state.key_input)
                        .password(true)
                        .hint_text("Paste your Gemini API key")
                        .desired_width(320.0),
                );
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                if (ui.button("Use key").clicked() || submitted) && !state.key_input.trim().is_empty() {
                    commands.push(EngineCommand::ProvideCredential(
                        std::mem::take(&mut state.key_input),
                    ));
                }
            });
        }

        if let Some(notice) = &state.notice {
            ui.label(egui::RichText::new(notice).small());
        }
    });
}

fn draw_choice_panel(ctx: &egui::Context, snapshot: &StorySnapshot, commands: &mut Vec<EngineCommand>) {
    egui::TopBottomPanel::bottom("choices")
        .min_height(90.0)
        .show(ctx, |ui| {
            ui.add_space(8.0);

            if snapshot.loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("The story is unfolding…");
                });
                return;
            }

            if let Some(error) = &snapshot.error {
                egui::Frame::new()
                    .fill(egui::Color32::from_rgb(90, 30, 30))
                    .corner_radius(egui::CornerRadius::same(6))
                    .inner_margin(egui::Margin::symmetric(10, 6))
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(&error.message).color(egui::Color32::WHITE));
                        ui.horizontal(|ui| {
                            if error.kind == FailureKind::Authorization {
                                ui.label("Enter an API key above to continue.");
                            }
                            if ui.button("Restart").clicked() {
                                commands.push(EngineCommand::Start);
                            }
                        });
                    });
                ui.add_space(6.0);
            }

            if snapshot.awaiting_game() {
                let hint = match snapshot.segments.last().and_then(|s| s.mini_game.as_ref()) {
                    Some(MiniGame::HiddenObject(game)) => {
                        format!("Find the {} to continue.", game.object_name())
                    }
                    _ => "Solve the puzzle to continue.".to_string(),
                };
                ui.label(egui::RichText::new(hint).italics());
                return;
            }

            let Some(turn) = &snapshot.turn else {
                return;
            };

            ui.label(egui::RichText::new(&turn.question).strong().size(16.0));
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                for key in [ChoiceKey::A, ChoiceKey::B] {
                    let text = format!("{key}: {}", turn.choices.option(key));
                    if ui
                        .add_enabled(!turn.in_flight, egui::Button::new(text).wrap())
                        .clicked()
                    {
                        commands.push(EngineCommand::Choose(key));
                    }
                }
            });
        });
}
