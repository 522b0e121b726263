//! Viewer configuration, read from TOML.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change:
//!
//! ```
//! use turntable_core::config::{PlaybackPolicy, ViewerConfig};
//!
//! let config = ViewerConfig::from_toml_str(
//!     r#"
//!     [interaction]
//!     drag_sensitivity = 0.005
//!
//!     [animation]
//!     playback = "all-clips"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.interaction.drag_sensitivity, 0.005);
//! assert_eq!(config.interaction.auto_rotate_speed, 0.005);
//! assert_eq!(config.animation.playback, PlaybackPolicy::AllClips);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::LoopMode;
use crate::error::ConfigError;

pub const DEFAULT_DRAG_SENSITIVITY: f32 = 0.001;
pub const DEFAULT_AUTO_ROTATE_SPEED: f32 = 0.005;
pub const DEFAULT_MODEL_PATH: &str = "/rabbit_squat/scene.gltf";
pub const DEFAULT_SKYBOX_FACE: &str = "/skybox/skybox_bg.jpg";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub interaction: InteractionConfig,
    pub animation: AnimationConfig,
    pub camera: CameraConfig,
    pub lighting: LightingConfig,
    pub render: RenderConfig,
    pub assets: AssetConfig,
}

impl ViewerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Pointer sensitivity and idle spin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Radians of rotation per pixel of pointer movement.
    pub drag_sensitivity: f32,
    /// Radians of yaw added on every frame without a drag.
    pub auto_rotate_speed: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_sensitivity: DEFAULT_DRAG_SENSITIVITY,
            auto_rotate_speed: DEFAULT_AUTO_ROTATE_SPEED,
        }
    }
}

/// Which of the asset's clips get an action when the model is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackPolicy {
    #[default]
    FirstClip,
    AllClips,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub playback: PlaybackPolicy,
    pub loop_mode: LoopMode,
    pub time_scale: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackPolicy::FirstClip,
            loop_mode: LoopMode::Repeat,
            time_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 10.0, 20.0],
            // An un-aimed camera looks straight down -Z.
            target: [0.0, 10.0, 0.0],
        }
    }
}

/// Light colours are `0xRRGGBB` integers, which TOML writes as hex literals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub sun_color: u32,
    pub sun_intensity: f32,
    pub sun_position: [f32; 3],
    pub ambient_color: u32,
    pub ambient_intensity: f32,
    pub hemisphere_sky: u32,
    pub hemisphere_ground: u32,
    pub hemisphere_intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            sun_color: 0xFFFFFF,
            sun_intensity: 1.5,
            sun_position: [5.0, 10.0, -5.0],
            ambient_color: 0xBFD1E5,
            ambient_intensity: 0.5,
            hemisphere_sky: 0xB1E1FF,
            hemisphere_ground: 0x6B8E23,
            hemisphere_intensity: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub exposure: f32,
    /// Shown behind the model until the skybox has loaded.
    pub clear_color: u32,
    /// Frame rate the terminal front-end aims for.
    pub target_fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            clear_color: 0x000000,
            target_fps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub model: String,
    /// Cube faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub skybox: [String; 6],
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_PATH.to_string(),
            skybox: std::array::from_fn(|_| DEFAULT_SKYBOX_FACE.to_string()),
        }
    }
}
