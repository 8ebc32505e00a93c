//! Board snapshots and penalty rows.
//!
//! Both types only carry opaque indices (`color`, `block_type`, item tags).
//! What those indices look like on screen is the renderer's business.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Reference board width in cells.
pub const BOARD_WIDTH: usize = 10;
/// Reference board height in cells.
pub const BOARD_HEIGHT: usize = 20;

/// Opaque identifier of a special item attached to a cell or piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTag(pub u8);

/// One board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub occupied: bool,
    /// Color index; the palette lives in the renderer.
    pub color: u8,
    /// Block type index (piece kind, garbage, ...).
    pub block_type: u8,
    pub bomb: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemTag>,
}

impl Cell {
    /// An occupied cell with the given color and type.
    pub fn filled(color: u8, block_type: u8) -> Self {
        Self {
            occupied: true,
            color,
            block_type,
            ..Self::default()
        }
    }
}

/// The falling piece drawn on top of the settled cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceOverlay {
    pub kind: u8,
    pub color: u8,
    /// Absolute `[x, y]` board coordinates of each block.
    pub cells: Vec<[i32; 2]>,
}

// ---------------------------------------------------------------------------
// GameStateSnapshot
// ---------------------------------------------------------------------------

/// Complete visible state of one player, captured once per sync tick.
///
/// A snapshot replaces the previous one wholesale on the receiving side;
/// there is no delta encoding and no field-level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    /// Sender wall clock (Unix millis) when the snapshot was captured.
    pub capture_time_millis: u64,
    /// Row-major grid, `board_cells[y][x]`.
    pub board_cells: Vec<Vec<Cell>>,
    pub active_piece_overlay: Option<PieceOverlay>,
    pub next_piece_identity: u8,
    pub pending_special_item_tag: Option<ItemTag>,
    pub score: u64,
    pub speed_multiplier: f64,
    pub difficulty_multiplier: f64,
    pub elapsed_seconds: u64,
    pub game_over_flag: bool,
    pub pause_flag: bool,
    /// Gravity interval in millis for `[self, opponent]`.
    pub fall_interval_per_player: [u64; 2],
}

impl GameStateSnapshot {
    /// An empty board of the given size with neutral multipliers.
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            capture_time_millis: 0,
            board_cells: vec![vec![Cell::default(); width]; height],
            active_piece_overlay: None,
            next_piece_identity: 0,
            pending_special_item_tag: None,
            score: 0,
            speed_multiplier: 1.0,
            difficulty_multiplier: 1.0,
            elapsed_seconds: 0,
            game_over_flag: false,
            pause_flag: false,
            fall_interval_per_player: [1000, 1000],
        }
    }

    /// Board width in cells (0 for an empty grid).
    pub fn width(&self) -> usize {
        self.board_cells.first().map_or(0, Vec::len)
    }

    /// Board height in cells.
    pub fn height(&self) -> usize {
        self.board_cells.len()
    }

    /// Returns the cell at `(x, y)`, if inside the grid.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.board_cells.get(y).and_then(|row| row.get(x))
    }

    /// Returns the same snapshot stamped with `capture_time_millis`.
    pub fn stamped(mut self, capture_time_millis: u64) -> Self {
        self.capture_time_millis = capture_time_millis;
        self
    }

    /// Checks the structural rules a decoded snapshot must satisfy: a
    /// non-empty rectangular grid and finite multipliers.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let width = self.width();
        if self.height() == 0 || width == 0 {
            return Err(ProtocolError::InvalidMessage("board grid is empty".into()));
        }
        if let Some(y) = self.board_cells.iter().position(|row| row.len() != width) {
            return Err(ProtocolError::InvalidMessage(format!(
                "board row {y} has {} cells, expected {width}",
                self.board_cells[y].len()
            )));
        }
        if !self.speed_multiplier.is_finite() || !self.difficulty_multiplier.is_finite() {
            return Err(ProtocolError::InvalidMessage("multiplier is not finite".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AttackBlockPacket
// ---------------------------------------------------------------------------

/// One row of penalty cells sent to the opponent after a multi-line clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackBlockPacket {
    pub board_width: usize,
    pub occupancy_pattern: Vec<bool>,
    pub color_per_column: Vec<u8>,
    pub block_type_per_column: Vec<u8>,
}

impl AttackBlockPacket {
    /// Minimum number of simultaneously cleared lines that sends an attack.
    pub const MIN_LINES_FOR_ATTACK: usize = 2;

    /// Builds a packet from per-column vectors.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if the vectors differ in length.
    pub fn new(
        occupancy_pattern: Vec<bool>,
        color_per_column: Vec<u8>,
        block_type_per_column: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        let packet = Self {
            board_width: occupancy_pattern.len(),
            occupancy_pattern,
            color_per_column,
            block_type_per_column,
        };
        packet.validate()?;
        Ok(packet)
    }

    /// Builds a packet that mirrors a row of board cells.
    pub fn from_cells(row: &[Cell]) -> Self {
        Self {
            board_width: row.len(),
            occupancy_pattern: row.iter().map(|c| c.occupied).collect(),
            color_per_column: row.iter().map(|c| c.color).collect(),
            block_type_per_column: row.iter().map(|c| c.block_type).collect(),
        }
    }

    /// Expands the packet back into board cells.
    pub fn to_cells(&self) -> Vec<Cell> {
        self.occupancy_pattern
            .iter()
            .zip(&self.color_per_column)
            .zip(&self.block_type_per_column)
            .map(|((&occupied, &color), &block_type)| Cell {
                occupied,
                color,
                block_type,
                ..Cell::default()
            })
            .collect()
    }

    /// Every per-column vector must be exactly `board_width` long.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let w = self.board_width;
        if w == 0 {
            return Err(ProtocolError::InvalidMessage("attack row has zero width".into()));
        }
        if self.occupancy_pattern.len() != w
            || self.color_per_column.len() != w
            || self.block_type_per_column.len() != w
        {
            return Err(ProtocolError::InvalidMessage(format!(
                "attack row columns disagree with width {w}: {}/{}/{}",
                self.occupancy_pattern.len(),
                self.color_per_column.len(),
                self.block_type_per_column.len()
            )));
        }
        Ok(())
    }
}
