//! Per-batch statistics computed by the vertex trace.
use bitos::bitos;
use glam::Vec2;
use strum::VariantArray;

use crate::regs::PrimType;

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum PrimClass {
    #[default]
    Point    = 0x0,
    Line     = 0x1,
    Triangle = 0x2,
    Sprite   = 0x3,
}

impl From<PrimType> for PrimClass {
    fn from(value: PrimType) -> Self {
        match value {
            PrimType::Point => Self::Point,
            PrimType::Line | PrimType::LineStrip => Self::Line,
            PrimType::Triangle | PrimType::TriangleStrip | PrimType::TriangleFan => Self::Triangle,
            PrimType::Sprite => Self::Sprite,
            // the GS draws nothing sensible here, treat it as points
            PrimType::Reserved => Self::Point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TracePoint {
    /// Position in target pixels, offset already applied.
    pub position: Vec2,
    pub z: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaRange {
    pub min: u8,
    pub max: u8,
}

impl Default for AlphaRange {
    fn default() -> Self {
        Self { min: 0, max: 0xFF }
    }
}

/// Whether a component is identical across every vertex of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Equality {
    pub rgba: bool,
    pub z: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexTrace {
    pub class: PrimClass,
    pub min: TracePoint,
    pub max: TracePoint,
    /// Alpha range of the fragments, texture included.
    pub alpha: AlphaRange,
    /// Per-channel minimum of the vertex colours.
    pub color_min: [u8; 4],
    pub eq: Equality,
    /// Whether sampling needs bilinear filtering.
    pub linear: bool,
}

impl VertexTrace {
    /// Whether every vertex carries the given colour.
    pub fn constant_color(&self, rgba: [u8; 4]) -> bool {
        self.eq.rgba && self.color_min == rgba
    }
}
