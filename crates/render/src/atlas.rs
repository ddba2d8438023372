use serde::{Deserialize, Serialize};

use crate::RenderError;

/// Normalised texture rectangle: `(s, t)` top-left, `(u, v)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TexCoords {
    pub s: f32,
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub width: f32,
    pub height: f32,
}

impl TexCoords {
    pub fn as_array(&self) -> [f32; 4] {
        [self.s, self.t, self.u, self.v]
    }
}

/// One sub-image of an atlas, in pixels plus its texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasFrame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub coords: TexCoords,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureAtlas {
    width: u32,
    height: u32,
    frames: Vec<AtlasFrame>,
}

impl TextureAtlas {
    /// Empty atlas for an image of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyAtlas { width, height });
        }
        Ok(Self {
            width,
            height,
            frames: Vec::new(),
        })
    }

    /// Frames laid out in a grid, row by row.
    pub fn from_grid(grid: &AtlasGridConfig) -> Result<Self, RenderError> {
        let mut atlas = Self::new(grid.image_width, grid.image_height)?;
        for row in 0..grid.rows {
            for col in 0..grid.columns {
                let x = grid.padding + col * (grid.frame_width + grid.padding);
                let y = grid.padding + row * (grid.frame_height + grid.padding);
                atlas.add_frame(x, y, grid.frame_width, grid.frame_height)?;
            }
        }
        Ok(atlas)
    }

    /// Append a frame and return its index.
    pub fn add_frame(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<usize, RenderError> {
        let fits = width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|r| r <= self.width)
            && y.checked_add(height).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(RenderError::FrameOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        let (w, h) = (self.width as f32, self.height as f32);
        let coords = TexCoords {
            s: x as f32 / w,
            t: y as f32 / h,
            u: (x + width) as f32 / w,
            v: (y + height) as f32 / h,
            width: width as f32 / w,
            height: height as f32 / h,
        };
        self.frames.push(AtlasFrame {
            x,
            y,
            width,
            height,
            coords,
        });
        Ok(self.frames.len() - 1)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`, in insertion order.
    pub fn frame(&self, index: usize) -> Option<&AtlasFrame> {
        self.frames.get(index)
    }
}

/// Maps tile ids onto a range of atlas frames.
///
/// Id `first_id` is frame `first_frame`; ids wrap modulo `frame_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSet {
    atlas: TextureAtlas,
    first_id: u32,
    first_frame: usize,
    frame_count: usize,
}

impl TileSet {
    /// All frames of `atlas`, tile id 1 on frame 0.
    pub fn new(atlas: TextureAtlas) -> Result<Self, RenderError> {
        let count = atlas.len();
        Self::with_range(atlas, 1, 0, count)
    }

    /// Tile set using `count` frames from `first_frame`, mapping
    /// `first_id` onto the first of them.
    pub fn with_range(
        atlas: TextureAtlas,
        first_id: u32,
        first_frame: usize,
        frame_count: usize,
    ) -> Result<Self, RenderError> {
        let end = first_frame + frame_count;
        if frame_count == 0 || end > atlas.len() {
            return Err(RenderError::FrameRange {
                first: first_frame,
                end,
                available: atlas.len(),
            });
        }
        Ok(Self {
            atlas,
            first_id,
            first_frame,
            frame_count,
        })
    }

    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    /// Tile id drawn with the first frame of the range.
    pub fn first_id(&self) -> u32 {
        self.first_id
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Atlas frame index for `tile_id`, wrapping within the range.
    pub fn frame_id(&self, tile_id: u32) -> usize {
        let rel = i64::from(tile_id) - i64::from(self.first_id);
        self.first_frame + rel.rem_euclid(self.frame_count as i64) as usize
    }

    /// Frame drawn for `tile_id`.
    pub fn frame(&self, tile_id: u32) -> Option<&AtlasFrame> {
        self.atlas.frame(self.frame_id(tile_id))
    }
}

/// Uniform grid of frames inside one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasGridConfig {
    pub image_width: u32,
    pub image_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub columns: u32,
    pub rows: u32,
    /// Gap around and between frames, in pixels.
    pub padding: u32,
}

impl Default for AtlasGridConfig {
    fn default() -> Self {
        Self {
            image_width: 256,
            image_height: 256,
            frame_width: 64,
            frame_height: 64,
            columns: 4,
            rows: 4,
            padding: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSetConfig {
    pub atlas: AtlasGridConfig,
    pub first_id: u32,
    pub first_frame: usize,
    /// `None` uses every frame from `first_frame` on.
    pub frame_count: Option<usize>,
}

impl Default for TileSetConfig {
    fn default() -> Self {
        Self {
            atlas: AtlasGridConfig::default(),
            first_id: 1,
            first_frame: 0,
            frame_count: None,
        }
    }
}

impl TileSetConfig {
    /// Slice the atlas grid and build the tile set.
    pub fn build(&self) -> Result<TileSet, RenderError> {
        let atlas = TextureAtlas::from_grid(&self.atlas)?;
        let count = self
            .frame_count
            .unwrap_or_else(|| atlas.len().saturating_sub(self.first_frame));
        TileSet::with_range(atlas, self.first_id, self.first_frame, count)
    }
}
