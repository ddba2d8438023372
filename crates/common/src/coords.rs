use serde::{Deserialize, Serialize};

use crate::CommonError;
use crate::aabb::Aabb2;

/// Maps continuous map coordinates onto the integer tile grid.
///
/// Tile `(x, y)` covers `[x * tile_width + x_offset, (x + 1) * tile_width + x_offset)`
/// horizontally and the equivalent range vertically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileCoordsMapper {
    tile_width: f32,
    tile_height: f32,
    x_offset: f32,
    y_offset: f32,
}

/// Integer tile range covering a rectangle, plus the tile-aligned rectangle
/// that range spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilesWithinCoords {
    pub tile_left: i32,
    pub tile_top: i32,
    pub columns: i32,
    pub rows: i32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl TilesWithinCoords {
    /// The snapped world rectangle.
    pub fn view(&self) -> Aabb2 {
        Aabb2::new(self.left, self.top, self.width, self.height)
    }

    /// Whether tile `(x, y)` is one of the covered cells.
    pub fn contains_cell(&self, x: i32, y: i32) -> bool {
        x >= self.tile_left
            && x < self.tile_left + self.columns
            && y >= self.tile_top
            && y < self.tile_top + self.rows
    }

    /// Covered cells, 0 for an empty rectangle.
    pub fn cell_count(&self) -> usize {
        (self.columns.max(0) as usize) * (self.rows.max(0) as usize)
    }

    /// Row-major iteration over every covered cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + use<> {
        let (left, top, columns, rows) = (self.tile_left, self.tile_top, self.columns, self.rows);
        (top..top + rows).flat_map(move |y| (left..left + columns).map(move |x| (x, y)))
    }
}

impl TileCoordsMapper {
    /// Mapper with no offset. Sizes must be finite and positive.
    pub fn new(tile_width: f32, tile_height: f32) -> Result<Self, CommonError> {
        Self::with_offset(tile_width, tile_height, 0.0, 0.0)
    }

    /// Mapper whose grid is shifted by `(x_offset, y_offset)`.
    pub fn with_offset(
        tile_width: f32,
        tile_height: f32,
        x_offset: f32,
        y_offset: f32,
    ) -> Result<Self, CommonError> {
        validate_tile_size(tile_width, tile_height)?;
        if !x_offset.is_finite() || !y_offset.is_finite() {
            return Err(CommonError::NonFinite("tile offset"));
        }
        Ok(Self {
            tile_width,
            tile_height,
            x_offset,
            y_offset,
        })
    }

    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    pub fn x_offset(&self) -> f32 {
        self.x_offset
    }

    pub fn y_offset(&self) -> f32 {
        self.y_offset
    }

    /// Grid cell containing the map-space point.
    pub fn tile_at(&self, x: f32, y: f32) -> (i32, i32) {
        (
            ((x - self.x_offset) / self.tile_width).floor() as i32,
            ((y - self.y_offset) / self.tile_height).floor() as i32,
        )
    }

    /// Map-space rectangle of grid cell `(x, y)`.
    pub fn tile_view(&self, x: i32, y: i32) -> Aabb2 {
        Aabb2::new(
            x as f32 * self.tile_width + self.x_offset,
            y as f32 * self.tile_height + self.y_offset,
            self.tile_width,
            self.tile_height,
        )
    }

    /// `[tile_left, tile_top, columns, rows]` of the smallest tile range
    /// covering the rectangle.
    pub fn get_tile_coords(&self, left: f32, top: f32, width: f32, height: f32) -> [i32; 4] {
        let (tile_left, columns) = cover_axis(left, width, self.tile_width, self.x_offset);
        let (tile_top, rows) = cover_axis(top, height, self.tile_height, self.y_offset);
        [tile_left, tile_top, columns, rows]
    }

    /// Snap a world rectangle outwards to whole tiles.
    pub fn compute_tiles_within_coords(
        &self,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> TilesWithinCoords {
        let [tile_left, tile_top, columns, rows] = self.get_tile_coords(left, top, width, height);
        TilesWithinCoords {
            tile_left,
            tile_top,
            columns,
            rows,
            left: tile_left as f32 * self.tile_width + self.x_offset,
            top: tile_top as f32 * self.tile_height + self.y_offset,
            width: columns as f32 * self.tile_width,
            height: rows as f32 * self.tile_height,
        }
    }
}

pub(crate) fn validate_tile_size(tile_width: f32, tile_height: f32) -> Result<(), CommonError> {
    if !(tile_width.is_finite() && tile_width > 0.0 && tile_height.is_finite() && tile_height > 0.0)
    {
        return Err(CommonError::InvalidTileSize {
            width: tile_width,
            height: tile_height,
        });
    }
    Ok(())
}

/// First tile index and tile count along one axis.
fn cover_axis(start: f32, extent: f32, tile: f32, offset: f32) -> (i32, i32) {
    let first = ((start - offset) / tile).floor();
    let snapped = first * tile + offset;
    let end = (first + (extent + (start - snapped)) / tile).ceil();
    (first as i32, (end - first) as i32)
}
