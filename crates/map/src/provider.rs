use serde::{Deserialize, Serialize};

use crate::MapError;

/// Source of tile ids for grid cells. Id `0` means "no tile".
pub trait TileDataProvider {
    fn tile_id_at(&self, x: i32, y: i32) -> u32;

    /// Row-major ids of a cell range, written into `target` (cleared first).
    fn tile_ids_within(&self, left: i32, top: i32, width: i32, height: i32, target: &mut Vec<u32>) {
        target.clear();
        for y in top..top + height {
            for x in left..left + width {
                target.push(self.tile_id_at(x, y));
            }
        }
    }
}

/// How the nested pattern lists map onto the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternOrientation {
    /// `pattern[y][x]`: each inner list is a row.
    #[default]
    Rows,
    /// `pattern[x][y]`: each inner list runs down the y axis.
    Columns,
}

/// Axes along which the pattern repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Both,
    /// Repeat along x only; rows outside the pattern are empty.
    Horizontal,
    /// Repeat along y only; columns outside the pattern are empty.
    Vertical,
}

/// Tiles a finite pattern across the plane.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatingTilesProvider {
    /// Row-major, `width * height`.
    cells: Vec<u32>,
    width: usize,
    height: usize,
    repeat: RepeatMode,
}

impl RepeatingTilesProvider {
    /// Pattern given as rows, repeating on both axes.
    pub fn new(pattern: Vec<Vec<u32>>) -> Result<Self, MapError> {
        Self::with_layout(pattern, PatternOrientation::Rows, RepeatMode::Both)
    }

    /// Pattern given as columns, repeating on both axes.
    pub fn vertical(pattern: Vec<Vec<u32>>) -> Result<Self, MapError> {
        Self::with_layout(pattern, PatternOrientation::Columns, RepeatMode::Both)
    }

    /// Pattern read in `orientation`, repeated along `repeat`.
    pub fn with_layout(
        pattern: Vec<Vec<u32>>,
        orientation: PatternOrientation,
        repeat: RepeatMode,
    ) -> Result<Self, MapError> {
        let outer = pattern.len();
        let inner = pattern.first().map_or(0, Vec::len);
        if outer == 0 || inner == 0 {
            return Err(MapError::EmptyPattern);
        }
        if let Some((i, line)) = pattern.iter().enumerate().find(|(_, l)| l.len() != inner) {
            return Err(MapError::RaggedPattern {
                line: i,
                expected: inner,
                actual: line.len(),
            });
        }

        let (width, height) = match orientation {
            PatternOrientation::Rows => (inner, outer),
            PatternOrientation::Columns => (outer, inner),
        };
        let mut cells = vec![0; width * height];
        for (i, line) in pattern.iter().enumerate() {
            for (j, &id) in line.iter().enumerate() {
                let (x, y) = match orientation {
                    PatternOrientation::Rows => (j, i),
                    PatternOrientation::Columns => (i, j),
                };
                cells[y * width + x] = id;
            }
        }
        Ok(Self {
            cells,
            width,
            height,
            repeat,
        })
    }

    /// Restrict repetition to one axis.
    pub fn repeat(mut self, repeat: RepeatMode) -> Self {
        self.repeat = repeat;
        self
    }

    /// Pattern columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Pattern rows.
    pub fn height(&self) -> usize {
        self.height
    }

    fn index_on_axis(v: i32, len: usize, repeats: bool) -> Option<usize> {
        let len = len as i64;
        let v = v as i64;
        if repeats {
            Some((((v % len) + len) % len) as usize)
        } else if (0..len).contains(&v) {
            Some(v as usize)
        } else {
            None
        }
    }
}

impl TileDataProvider for RepeatingTilesProvider {
    fn tile_id_at(&self, x: i32, y: i32) -> u32 {
        let (repeat_x, repeat_y) = match self.repeat {
            RepeatMode::Both => (true, true),
            RepeatMode::Horizontal => (true, false),
            RepeatMode::Vertical => (false, true),
        };
        match (
            Self::index_on_axis(x, self.width, repeat_x),
            Self::index_on_axis(y, self.height, repeat_y),
        ) {
            (Some(col), Some(row)) => self.cells[row * self.width + col],
            _ => 0,
        }
    }
}
