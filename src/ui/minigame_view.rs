use eframe::egui;
use egui::{pos2, Color32, Rect, Stroke};

use crate::engine::protocol::EngineCommand;
use crate::minigame::hidden_object::{HiddenObjectGame, HiddenZone};
use crate::minigame::jigsaw::JigsawGame;
use crate::minigame::MiniGamePhase;
use crate::model::segment::NarrativeSegment;
use crate::ui::textures::SceneTextures;

/// Selection state the mini-game views keep between frames.
#[derive(Default)]
pub struct GameUiState {
    /// Piece picked from the tray, waiting for a slot click.
    pub selected_piece: Option<usize>,
    /// Last wrong cell, tinted until the next click.
    pub last_miss: Option<HiddenZone>,
}

const MAX_SCENE_WIDTH: f32 = 720.0;

fn cell_rect(image: Rect, row: usize, col: usize, rows: usize, cols: usize) -> Rect {
    let w = image.width() / cols as f32;
    let h = image.height() / rows as f32;
    Rect::from_min_size(
        pos2(image.left() + w * col as f32, image.top() + h * row as f32),
        egui::vec2(w, h),
    )
}

fn waiting_for_scene(ui: &mut egui::Ui, segment: &NarrativeSegment) {
    match segment.media.image.error() {
        Some(_) => {
            ui.label("The scene could not be painted, so there is nothing to play.");
        }
        None => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Painting the scene…");
            });
        }
    }
}

/* =========================
   Hidden object
   ========================= */

pub fn draw_hidden_object(
    ui: &mut egui::Ui,
    textures: &mut SceneTextures,
    segment: &NarrativeSegment,
    game: &HiddenObjectGame,
    state: &mut GameUiState,
) -> Option<EngineCommand> {
    let solved = game.phase() == MiniGamePhase::Solved;

    if solved {
        ui.label(format!("You found the {}!", game.object_name()));
    } else {
        ui.label(
            egui::RichText::new(format!("Find the {} hidden in the scene.", game.object_name()))
                .strong(),
        );
    }

    let Some(image) = segment.media.image.ready() else {
        waiting_for_scene(ui, segment);
        return None;
    };
    let texture = textures.scene(ui.ctx(), &segment.id, image)?.clone();

    let size = texture.size_vec2();
    let width = ui.available_width().min(MAX_SCENE_WIDTH);
    let display = size * (width / size.x.max(1.0));
    let response = ui.add(
        egui::Image::new((texture.id(), display)).sense(if solved {
            egui::Sense::hover()
        } else {
            egui::Sense::click()
        }),
    );

    let rect = response.rect;
    let painter = ui.painter_at(rect);
    let line = Stroke::new(1.0, Color32::from_white_alpha(90));
    for i in 1..3 {
        let x = rect.left() + rect.width() * i as f32 / 3.0;
        let y = rect.top() + rect.height() * i as f32 / 3.0;
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], line);
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], line);
    }

    let zone_rect = |zone: HiddenZone| {
        let index = HiddenZone::ALL
            .iter()
            .position(|z| *z == zone)
            .unwrap_or(4);
        cell_rect(rect, index / 3, index % 3, 3, 3)
    };

    if solved {
        painter.rect_filled(
            zone_rect(game.target()),
            0.0,
            Color32::from_rgba_unmultiplied(80, 200, 120, 70),
        );
        return None;
    }
    if let Some(miss) = state.last_miss {
        painter.rect_filled(zone_rect(miss), 0.0, Color32::from_rgba_unmultiplied(200, 60, 60, 60));
    }

    if !response.clicked() {
        return None;
    }
    let pos = response.interact_pointer_pos()?;
    let col = (((pos.x - rect.left()) / rect.width()) * 3.0).floor().clamp(0.0, 2.0) as usize;
    let row = (((pos.y - rect.top()) / rect.height()) * 3.0).floor().clamp(0.0, 2.0) as usize;
    let zone = HiddenZone::from_cell(row, col)?;

    state.last_miss = (zone != game.target()).then_some(zone);
    Some(EngineCommand::AttemptHiddenObject {
        segment: segment.id.clone(),
        zone,
    })
}

/* =========================
   Jigsaw
   ========================= */

pub fn draw_jigsaw(
    ui: &mut egui::Ui,
    textures: &mut SceneTextures,
    segment: &NarrativeSegment,
    game: &JigsawGame,
    state: &mut GameUiState,
) -> Option<EngineCommand> {
    let size = game.size();

    if game.phase() == MiniGamePhase::Solved {
        ui.label("Puzzle complete!");
    } else {
        ui.label(
            egui::RichText::new(format!(
                "Rebuild the scene: {} of {} pieces placed.",
                game.placed_count(),
                size.piece_count()
            ))
            .strong(),
        );
    }

    let Some(image) = segment.media.image.ready() else {
        waiting_for_scene(ui, segment);
        return None;
    };
    let pieces = textures
        .pieces(ui.ctx(), &segment.id, image, size)?
        .to_vec();
    let first = pieces.first()?.size_vec2();

    let board_width = ui.available_width().min(MAX_SCENE_WIDTH);
    let cell = egui::vec2(
        board_width / size.cols as f32,
        board_width / size.cols as f32 * first.y / first.x.max(1.0),
    );

    let mut command = None;

    egui::Grid::new(("jigsaw_board", segment.id.sequence()))
        .spacing([2.0, 2.0])
        .show(ui, |ui| {
            for row in 0..size.rows {
                for col in 0..size.cols {
                    if let Some(piece) = game.slot(row, col) {
                        ui.add(egui::Image::new((pieces[piece.id].id(), cell)));
                        continue;
                    }

                    let (rect, response) = ui.allocate_exact_size(cell, egui::Sense::click());
                    let fill = if response.hovered() && state.selected_piece.is_some() {
                        Color32::from_gray(70)
                    } else {
                        Color32::from_gray(35)
                    };
                    ui.painter().rect_filled(rect, 2.0, fill);

                    if response.clicked() {
                        if let Some(piece) = state.selected_piece.take() {
                            command = Some(EngineCommand::PlacePuzzlePiece {
                                segment: segment.id.clone(),
                                piece,
                                row,
                                col,
                            });
                        }
                    }
                }
                ui.end_row();
            }
        });

    if game.phase() == MiniGamePhase::Solved {
        return command;
    }

    ui.add_space(6.0);
    ui.label("Pick a piece, then click where it belongs.");

    let thumb = cell * 0.6;
    ui.horizontal_wrapped(|ui| {
        for piece in game.tray() {
            let selected = state.selected_piece == Some(piece.id);
            let button = egui::Button::image(egui::Image::new((pieces[piece.id].id(), thumb)))
                .selected(selected);
            if ui.add(button).clicked() {
                state.selected_piece = (!selected).then_some(piece.id);
            }
        }
    });

    if ui.button("Hint").clicked() {
        state.selected_piece = None;
        command = Some(EngineCommand::PuzzleHint(segment.id.clone()));
    }

    command
}
