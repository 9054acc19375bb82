use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Supported board dimensions. A board always has `side × side` cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GridSize {
    /// 4×4 board (16 cells).
    #[default]
    Four,
    /// 5×5 board (25 cells).
    Five,
    /// 6×6 board (36 cells).
    Six,
}

impl GridSize {
    /// Every supported size, smallest first.
    pub const ALL: [GridSize; 3] = [GridSize::Four, GridSize::Five, GridSize::Six];

    /// Board dimension (4, 5, or 6).
    pub fn side(self) -> u16 {
        match self {
            GridSize::Four => 4,
            GridSize::Five => 5,
            GridSize::Six => 6,
        }
    }

    /// Total number of cells on the board, and also the highest cell value.
    pub fn cell_count(self) -> u16 {
        self.side() * self.side()
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.side())
    }
}

/// Error returned when a raw integer is not a supported grid size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported grid size {0}: expected 4, 5, or 6")]
pub struct InvalidGridSize(pub u8);

impl TryFrom<u8> for GridSize {
    type Error = InvalidGridSize;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(GridSize::Four),
            5 => Ok(GridSize::Five),
            6 => Ok(GridSize::Six),
            other => Err(InvalidGridSize(other)),
        }
    }
}

impl From<GridSize> for u8 {
    fn from(value: GridSize) -> Self {
        value.side() as u8
    }
}

/// The shuffled assignment of values `1..=N²` to cell positions.
///
/// A board is generated wholesale per round and never mutated afterwards; a
/// reset or grid-size change replaces it with a fresh permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Vec<u16>,
}

impl Board {
    /// Generate a uniformly random permutation of `1..=N²` for the given size.
    pub fn generate(grid_size: GridSize) -> Self {
        let mut cells: Vec<u16> = (1..=grid_size.cell_count()).collect();
        cells.shuffle(&mut rand::rng());
        Self { cells }
    }

    /// Cell values in board order (row-major as far as the view is concerned).
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }
}

/// Summary of one completed round, produced by the state machine on the
/// completing click and handed to the persistence layer by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// Identifier allocated when the record is produced.
    pub id: Uuid,
    /// Board size the round was played on.
    pub grid_size: GridSize,
    /// Wall-clock time of the first (starting) click.
    pub started_at: OffsetDateTime,
    /// Wall-clock time of the completing click.
    pub ended_at: OffsetDateTime,
}
