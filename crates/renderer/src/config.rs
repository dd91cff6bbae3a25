//! Renderer configuration.
use easyerr::ResultExt;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigCtx, ConfigError};

/// Titles that need a workaround for draws the renderer can't handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Title {
    #[default]
    Other,
    Ico,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HalfPixelOffset {
    #[default]
    Off,
    /// Nudges the vertex offset of targets that are likely rendered with a half pixel offset.
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// Alpha value the destination alpha test compares the MSB against.
    pub alpha_threshold: u8,
    /// Batches with fewer indices than this never take the one pixel path on their own.
    pub small_batch_indices: usize,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: 0x80,
            small_batch_indices: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hacks {
    /// Force the shader to write alpha, regardless of the frame mask.
    pub alpha_hack: bool,
    /// Turn general stencil DATE without alpha test into a one pixel draw.
    pub alpha_stencil: bool,
    pub half_pixel_offset: HalfPixelOffset,
    /// Texture coordinate offset, in thousandths of a texel.
    pub tc_offset: [u16; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logarithmic depth, used when the device has no 32 bit depth format.
    pub logz: bool,
    /// Emulate frame buffer alpha correction.
    pub fba: bool,
    /// Take the one pixel DATE path for large batches too.
    pub accurate_date: bool,
    /// Zero disables anisotropic filtering.
    pub max_anisotropy: u8,
    /// Palette lookups happen in the shader.
    pub paltex: bool,
    /// Where the host GPU samples a pixel, relative to its top left corner.
    pub pixel_center: [f32; 2],
    pub date: DateConfig,
    pub hacks: Hacks,
    pub title: Title,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logz: true,
            fba: true,
            accurate_date: false,
            max_anisotropy: 0,
            paltex: false,
            pixel_center: [-0.5, -0.5],
            date: DateConfig::default(),
            hacks: Hacks::default(),
            title: Title::default(),
        }
    }
}

impl Config {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).context(ConfigCtx::Parse)
    }

    pub fn tc_offset(&self) -> [f32; 2] {
        self.hacks.tc_offset.map(|x| x as f32 / -1000.0)
    }
}
