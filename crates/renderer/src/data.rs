//! Constant buffer payloads uploaded per draw.
use glam::{Vec2, Vec4};
use zerocopy::{Immutable, IntoBytes};

#[derive(Debug, Clone, Copy, PartialEq, Immutable, IntoBytes, Default)]
#[repr(C)]
pub struct VsConstants {
    pub vertex_scale: Vec4,
    pub vertex_offset: Vec4,
    /// Texel scale in xy, realignment offset of target sources in zw.
    pub texture_scale_offset: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq, Immutable, IntoBytes, Default)]
#[repr(C)]
pub struct GsConstants {
    pub point_size: Vec2,
    pub _pad0: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Immutable, IntoBytes, Default)]
#[repr(C)]
pub struct PsConstants {
    /// Fog colour in xyz, alpha reference in w.
    pub fog_color_aref: Vec4,
    pub half_texel: Vec4,
    /// TW, TH and the size of the bound texture.
    pub wh: Vec4,
    pub min_max: Vec4,
    pub minf_ta: Vec4,
    pub msk_fix: Vec4,
    pub tc_offset_hack: Vec4,
    /// Partial texture shuffle masks of the red-green and blue-alpha halves.
    pub fb_mask: Vec4,
}

impl PsConstants {
    pub fn with_aref(mut self, aref: f32) -> Self {
        self.fog_color_aref.w = aref;
        self
    }
}
