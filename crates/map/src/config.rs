use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tessera_common::{Camera, TileCoordsMapper};

use crate::layer::MapLayer;
use crate::provider::{PatternOrientation, RepeatMode, RepeatingTilesProvider};
use crate::visibility::{CameraVisibility, CameraVisibilityOptions, RectangularVisibility};
use crate::MapError;

/// Which visibility strategy a layer uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisibilityConfig {
    Rectangular { width: f32, height: f32 },
    Camera(CameraVisibilityOptions),
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        VisibilityConfig::Rectangular {
            width: 32.0,
            height: 18.0,
        }
    }
}

/// Pattern for a [`RepeatingTilesProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatingPatternConfig {
    pub pattern: Vec<Vec<u32>>,
    pub orientation: PatternOrientation,
    pub repeat: RepeatMode,
}

impl Default for RepeatingPatternConfig {
    fn default() -> Self {
        Self {
            pattern: vec![vec![1, 2], vec![3, 4]],
            orientation: PatternOrientation::Rows,
            repeat: RepeatMode::Both,
        }
    }
}

impl RepeatingPatternConfig {
    /// Validated provider for this pattern.
    pub fn build(&self) -> Result<RepeatingTilesProvider, MapError> {
        RepeatingTilesProvider::with_layout(self.pattern.clone(), self.orientation, self.repeat)
    }
}

/// Everything needed to stand up a map layer and its sprite renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub center: Vec2,
    pub tile_width: f32,
    pub tile_height: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub visibility: VisibilityConfig,
    /// Sprite slots reserved by the renderer.
    pub capacity: usize,
    pub pattern: RepeatingPatternConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            tile_width: 1.0,
            tile_height: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
            visibility: VisibilityConfig::default(),
            capacity: 1024,
            pattern: RepeatingPatternConfig::default(),
        }
    }
}

impl LayerConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Tile mapper for the configured size and offset.
    pub fn mapper(&self) -> Result<TileCoordsMapper, MapError> {
        Ok(TileCoordsMapper::with_offset(
            self.tile_width,
            self.tile_height,
            self.x_offset,
            self.y_offset,
        )?)
    }

    /// Check tile sizes, center, visibility options and capacity.
    pub fn validate(&self) -> Result<(), MapError> {
        self.mapper()?;
        if !self.center.is_finite() {
            return Err(MapError::InvalidOption {
                name: "center",
                value: f32::NAN,
            });
        }
        match &self.visibility {
            VisibilityConfig::Rectangular { width, height } => {
                RectangularVisibility::new(*width, *height)?;
            }
            VisibilityConfig::Camera(options) => options.validate()?,
        }
        if self.capacity == 0 {
            return Err(MapError::InvalidOption {
                name: "capacity",
                value: 0.0,
            });
        }
        self.pattern.build()?;
        Ok(())
    }

    /// Build a layer with its visibility strategy. Camera visibility needs
    /// `camera`; the rectangular window ignores it.
    pub fn build_layer(&self, camera: Option<&Rc<RefCell<Camera>>>) -> Result<MapLayer, MapError> {
        let mut layer = MapLayer::with_mapper(self.mapper()?);
        layer.set_center(self.center);
        match &self.visibility {
            VisibilityConfig::Rectangular { width, height } => {
                layer.set_visibility(Box::new(RectangularVisibility::new(*width, *height)?));
            }
            VisibilityConfig::Camera(options) => {
                let camera = camera.ok_or(MapError::MissingCamera)?;
                layer.set_visibility(Box::new(CameraVisibility::new(camera, *options)?));
            }
        }
        Ok(layer)
    }
}
