//! Vertex layout shared with the host GPU.
use glam::Vec2;
use zerocopy::{Immutable, IntoBytes};

/// A GS vertex as accumulated by the vertex kick logic.
#[derive(Debug, Clone, Copy, PartialEq, Immutable, IntoBytes, Default)]
#[repr(C)]
pub struct Vertex {
    pub st: Vec2,
    pub rgba: [u8; 4],
    pub q: f32,
    /// Position in 1/16 pixels, before the XYOFFSET subtraction.
    pub x: u16,
    pub y: u16,
    pub z: u32,
    /// Texel coordinates in 1/16 texels.
    pub u: u16,
    pub v: u16,
    pub fog: u32,
}

const _: () = assert!(size_of::<Vertex>() == 32);

/// Vertex of the full-rectangle draws used by the DATE stencil setup.
#[derive(Debug, Clone, Copy, PartialEq, Immutable, IntoBytes, Default)]
#[repr(C)]
pub struct RectVertex {
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
}
