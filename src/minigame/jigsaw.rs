use rand::seq::SliceRandom;
use rand::Rng;

use crate::minigame::MiniGamePhase;

/// Grid dimensions of a puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzleSize {
    pub rows: usize,
    pub cols: usize,
}

impl PuzzleSize {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    /// Grids grow with the 1-based story number.
    pub fn for_story(story_number: usize) -> Self {
        match story_number {
            0 | 1 => Self::new(2, 2),
            2 | 3 => Self::new(2, 3),
            4 | 5 => Self::new(3, 3),
            6 | 7 => Self::new(3, 4),
            _ => Self::new(4, 4),
        }
    }

    pub fn piece_count(&self) -> usize {
        self.rows * self.cols
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzlePiece {
    pub id: usize,
    pub correct_row: usize,
    pub correct_col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed,
    /// The placement filled the last slot.
    Completed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JigsawGame {
    size: PuzzleSize,
    pieces: Vec<PuzzlePiece>,
    /// Ids of unplaced pieces in shuffled order.
    tray: Vec<usize>,
    /// Row-major board, each slot holding a piece id once placed.
    slots: Vec<Option<usize>>,
    phase: MiniGamePhase,
}

impl JigsawGame {
    pub fn new<R: Rng + ?Sized>(size: PuzzleSize, rng: &mut R) -> Self {
        let pieces: Vec<PuzzlePiece> = (0..size.piece_count())
            .map(|id| PuzzlePiece {
                id,
                correct_row: id / size.cols,
                correct_col: id % size.cols,
            })
            .collect();

        let mut tray: Vec<usize> = pieces.iter().map(|piece| piece.id).collect();
        tray.shuffle(rng);

        Self {
            size,
            pieces,
            tray,
            slots: vec![None; size.piece_count()],
            phase: MiniGamePhase::Pending,
        }
    }

    /// Puts `piece_id` into slot (`row`, `col`) if that is where it belongs.
    pub fn place(&mut self, piece_id: usize, row: usize, col: usize) -> PlacementOutcome {
        if self.phase == MiniGamePhase::Solved || row >= self.size.rows || col >= self.size.cols {
            return PlacementOutcome::Rejected;
        }
        let Some(piece) = self.pieces.get(piece_id).copied() else {
            return PlacementOutcome::Rejected;
        };
        let Some(tray_position) = self.tray.iter().position(|&id| id == piece_id) else {
            return PlacementOutcome::Rejected;
        };
        if piece.correct_row != row || piece.correct_col != col {
            return PlacementOutcome::Rejected;
        }

        let slot = row * self.size.cols + col;
        if self.slots[slot].is_some() {
            return PlacementOutcome::Rejected;
        }

        self.tray.remove(tray_position);
        self.slots[slot] = Some(piece_id);

        if self.placed_count() == self.size.piece_count() {
            self.phase = MiniGamePhase::Solved;
            PlacementOutcome::Completed
        } else {
            PlacementOutcome::Placed
        }
    }

    /// Places one random unplaced piece into its slot.
    pub fn hint<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(usize, PlacementOutcome)> {
        let piece_id = *self.tray.choose(rng)?;
        let piece = self.pieces[piece_id];
        let outcome = self.place(piece_id, piece.correct_row, piece.correct_col);
        Some((piece_id, outcome))
    }

    pub fn reveal(&mut self) {
        if self.phase == MiniGamePhase::Pending {
            self.phase = MiniGamePhase::InProgress;
        }
    }

    pub fn phase(&self) -> MiniGamePhase {
        self.phase
    }

    pub fn size(&self) -> PuzzleSize {
        self.size
    }

    pub fn placed_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Unplaced pieces in tray order.
    pub fn tray(&self) -> impl Iterator<Item = &PuzzlePiece> + '_ {
        self.tray.iter().map(|&id| &self.pieces[id])
    }

    pub fn slot(&self, row: usize, col: usize) -> Option<&PuzzlePiece> {
        if row >= self.size.rows || col >= self.size.cols {
            return None;
        }
        self.slots[row * self.size.cols + col].map(|id| &self.pieces[id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game(rows: usize, cols: usize) -> JigsawGame {
        JigsawGame::new(PuzzleSize::new(rows, cols), &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn tray_holds_every_piece_once() {
        let game = game(3, 4);
        let mut ids: Vec<usize> = game.tray().map(|piece| piece.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn misplaced_piece_is_rejected() {
        let mut game = game(2, 3);
        // Piece 4 belongs at (1, 1).
        assert_eq!(game.place(4, 0, 1), PlacementOutcome::Rejected);
        assert_eq!(game.place(4, 5, 5), PlacementOutcome::Rejected);
        assert_eq!(game.place(99, 0, 0), PlacementOutcome::Rejected);
        assert_eq!(game.placed_count(), 0);

        assert_eq!(game.place(4, 1, 1), PlacementOutcome::Placed);
        assert_eq!(game.place(4, 1, 1), PlacementOutcome::Rejected);
        assert_eq!(game.slot(1, 1).map(|piece| piece.id), Some(4));
        assert_eq!(game.tray().count(), 5);
    }

    #[test]
    fn completion_fires_once_on_the_last_piece() {
        let mut game = game(2, 2);
        let mut completions = 0;

        for id in 0..4 {
            match game.place(id, id / 2, id % 2) {
                PlacementOutcome::Completed => completions += 1,
                PlacementOutcome::Placed => assert!(id < 3),
                PlacementOutcome::Rejected => panic!("piece {id} rejected"),
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(game.phase(), MiniGamePhase::Solved);
        assert_eq!(game.place(0, 0, 0), PlacementOutcome::Rejected);
    }

    #[test]
    fn hints_count_as_placements() {
        let mut game = game(2, 3);
        let mut rng = StdRng::seed_from_u64(1);

        let mut outcomes = Vec::new();
        while let Some((_, outcome)) = game.hint(&mut rng) {
            outcomes.push(outcome);
        }

        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes.last(), Some(&PlacementOutcome::Completed));
        assert!(outcomes[..5].iter().all(|o| *o == PlacementOutcome::Placed));
        assert!(game.hint(&mut rng).is_none());
    }

    #[test]
    fn grids_grow_with_the_story() {
        assert_eq!(PuzzleSize::for_story(1), PuzzleSize::new(2, 2));
        assert_eq!(PuzzleSize::for_story(3), PuzzleSize::new(2, 3));
        assert_eq!(PuzzleSize::for_story(5), PuzzleSize::new(3, 3));
        assert_eq!(PuzzleSize::for_story(6), PuzzleSize::new(3, 4));
        assert_eq!(PuzzleSize::for_story(12), PuzzleSize::new(4, 4));
    }
}
