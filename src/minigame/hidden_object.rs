use std::fmt;

use crate::minigame::MiniGamePhase;

/// One cell of the 3×3 search grid laid over the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HiddenZone {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl HiddenZone {
    /// Row-major order.
    pub const ALL: [HiddenZone; 9] = [
        HiddenZone::TopLeft,
        HiddenZone::TopCenter,
        HiddenZone::TopRight,
        HiddenZone::MiddleLeft,
        HiddenZone::MiddleCenter,
        HiddenZone::MiddleRight,
        HiddenZone::BottomLeft,
        HiddenZone::BottomCenter,
        HiddenZone::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HiddenZone::TopLeft => "top-left",
            HiddenZone::TopCenter => "top-center",
            HiddenZone::TopRight => "top-right",
            HiddenZone::MiddleLeft => "middle-left",
            HiddenZone::MiddleCenter => "middle-center",
            HiddenZone::MiddleRight => "middle-right",
            HiddenZone::BottomLeft => "bottom-left",
            HiddenZone::BottomCenter => "bottom-center",
            HiddenZone::BottomRight => "bottom-right",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace([' ', '_'], "-");
        Self::ALL
            .into_iter()
            .find(|zone| zone.as_str() == normalized)
    }

    /// Zone for a grid cell; `None` outside the 3×3 grid.
    pub fn from_cell(row: usize, col: usize) -> Option<Self> {
        if row > 2 || col > 2 {
            return None;
        }
        Some(Self::ALL[row * 3 + col])
    }
}

impl fmt::Display for HiddenZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found,
    Missed,
    AlreadySolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenObjectGame {
    object_name: String,
    target: HiddenZone,
    phase: MiniGamePhase,
}

impl HiddenObjectGame {
    pub fn new(object_name: impl Into<String>, target: HiddenZone) -> Self {
        Self {
            object_name: object_name.into(),
            target,
            phase: MiniGamePhase::Pending,
        }
    }

    /// Wrong guesses change nothing and are not limited.
    pub fn attempt(&mut self, zone: HiddenZone) -> SearchOutcome {
        if self.phase == MiniGamePhase::Solved {
            return SearchOutcome::AlreadySolved;
        }
        if zone != self.target {
            return SearchOutcome::Missed;
        }

        self.phase = MiniGamePhase::Solved;
        SearchOutcome::Found
    }

    pub fn reveal(&mut self) {
        if self.phase == MiniGamePhase::Pending {
            self.phase = MiniGamePhase::InProgress;
        }
    }

    pub fn phase(&self) -> MiniGamePhase {
        self.phase
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn target(&self) -> HiddenZone {
        self.target
    }
}
