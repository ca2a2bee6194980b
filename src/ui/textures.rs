use eframe::egui;
use image::imageops;
use image::RgbaImage;
use std::collections::HashMap;
use tracing::warn;

use crate::minigame::jigsaw::PuzzleSize;
use crate::model::media::SceneImage;
use crate::model::segment::SegmentId;

pub fn decode_scene(image: &SceneImage) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory(&image.bytes)?.to_rgba8())
}

/// Cuts `scene` into `size.rows × size.cols` tiles, row-major.
/// Edge tiles absorb the remainder when the image does not divide evenly.
pub fn cut_pieces(scene: &RgbaImage, size: PuzzleSize) -> Vec<RgbaImage> {
    let (width, height) = scene.dimensions();
    let rows = size.rows as u32;
    let cols = size.cols as u32;
    let tile_w = (width / cols).max(1);
    let tile_h = (height / rows).max(1);

    let mut pieces = Vec::with_capacity(size.piece_count());
    for row in 0..rows {
        for col in 0..cols {
            let x = col * tile_w;
            let y = row * tile_h;
            let w = if col + 1 == cols { width.saturating_sub(x).max(1) } else { tile_w };
            let h = if row + 1 == rows { height.saturating_sub(y).max(1) } else { tile_h };
            pieces.push(imageops::crop_imm(scene, x, y, w, h).to_image());
        }
    }
    pieces
}

fn to_color_image(image: &RgbaImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw())
}

struct SceneEntry {
    decoded: RgbaImage,
    texture: egui::TextureHandle,
    pieces: Option<(PuzzleSize, Vec<egui::TextureHandle>)>,
}

/// GPU textures for scene images, keyed by segment.
#[derive(Default)]
pub struct SceneTextures {
    entries: HashMap<SegmentId, Option<SceneEntry>>,
}

impl SceneTextures {
    pub fn scene(
        &mut self,
        ctx: &egui::Context,
        segment: &SegmentId,
        image: &SceneImage,
    ) -> Option<&egui::TextureHandle> {
        self.entry(ctx, segment, image).map(|entry| &entry.texture)
    }

    /// Piece textures in piece-id order.
    pub fn pieces(
        &mut self,
        ctx: &egui::Context,
        segment: &SegmentId,
        image: &SceneImage,
        size: PuzzleSize,
    ) -> Option<&[egui::TextureHandle]> {
        let entry = self.entry(ctx, segment, image)?;

        let stale = entry.pieces.as_ref().is_none_or(|(cut, _)| *cut != size);
        if stale {
            let textures = cut_pieces(&entry.decoded, size)
                .iter()
                .enumerate()
                .map(|(index, piece)| {
                    ctx.load_texture(
                        format!("{segment}-piece-{index}"),
                        to_color_image(piece),
                        egui::TextureOptions::LINEAR,
                    )
                })
                .collect();
            entry.pieces = Some((size, textures));
        }

        entry.pieces.as_ref().map(|(_, textures)| textures.as_slice())
    }

    /// Drops textures of segments that are no longer in the story.
    pub fn retain(&mut self, live: &[SegmentId]) {
        self.entries.retain(|id, _| live.contains(id));
    }

    fn entry(
        &mut self,
        ctx: &egui::Context,
        segment: &SegmentId,
        image: &SceneImage,
    ) -> Option<&mut SceneEntry> {
        self.entries
            .entry(segment.clone())
            .or_insert_with(|| match decode_scene(image) {
                Ok(decoded) => {
                    let texture = ctx.load_texture(
                        segment.to_string(),
                        to_color_image(&decoded),
                        egui::TextureOptions::LINEAR,
                    );
                    Some(SceneEntry {
                        decoded,
                        texture,
                        pieces: None,
                    })
                }
                Err(err) => {
                    warn!(%segment, %err, "scene image could not be decoded");
                    None
                }
            })
            .as_mut()
    }
}
