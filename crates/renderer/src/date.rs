//! Destination alpha test emulation.
//!
//! The GS can reject pixels based on the MSB of the alpha already in the frame buffer. Host GPUs
//! can't read the target while drawing to it, so the test is emulated either by tagging passing
//! pixels in the stencil buffer first, or by sampling a copy of the target in the shader.
use glam::{UVec2, Vec2, Vec4};
use gs::trace::AlphaRange;
use gs::{PrimClass, RectVertex, VertexTrace};

use crate::config::DateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStrategy {
    /// The draw doesn't use the destination alpha test.
    #[default]
    Off,
    /// The test can't change the outcome of the draw.
    Skip,
    /// Only the first write to a pixel can pass: tag pixels in the stencil buffer and clear the
    /// tag on write.
    OnePixel,
    /// Tag passing pixels in the stencil buffer, then only draw tagged pixels.
    Stencil,
    /// Test in the shader against a copy of the target.
    Copy,
}

impl DateStrategy {
    pub fn uses_stencil(self) -> bool {
        matches!(self, Self::OnePixel | Self::Stencil)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DateInput {
    pub datm: bool,
    pub alpha_written: bool,
    pub alpha_test: bool,
    pub alpha: AlphaRange,
    pub class: PrimClass,
    pub index_count: usize,
    /// A stencil buffer is available for tagging.
    pub stencil: bool,
}

/// Whether at most one write per pixel can pass the test, so the first write may clear the tag.
///
/// That's the case when every fragment flips the destination alpha MSB away from DATM. Otherwise
/// sprites and small batches rarely overlap themselves and the general strategy is cheap enough.
pub fn one_pixel(input: &DateInput, config: &DateConfig, accurate: bool) -> bool {
    let threshold = config.alpha_threshold;
    if input.datm && input.alpha.max < threshold {
        return true;
    }

    if !input.datm && input.alpha.min >= threshold {
        return true;
    }

    if input.class == PrimClass::Sprite || input.index_count < config.small_batch_indices {
        return false;
    }

    accurate
}

pub fn select(input: &DateInput, config: &DateConfig, accurate: bool) -> DateStrategy {
    if !input.alpha_written && !input.alpha_test {
        return DateStrategy::Skip;
    }

    if !input.stencil {
        return DateStrategy::Copy;
    }

    let fast = input.alpha_written && !input.alpha_test && one_pixel(input, config, accurate);
    if fast {
        DateStrategy::OnePixel
    } else {
        DateStrategy::Stencil
    }
}

/// Strip covering the bounds of the draw, in clip space, with target texture coordinates.
pub fn stencil_rect(trace: &VertexTrace, size: UVec2, scale: Vec2) -> [RectVertex; 4] {
    let s = scale / size.as_vec2();
    let bounds = Vec4::new(
        trace.min.position.x,
        trace.min.position.y,
        trace.max.position.x,
        trace.max.position.y,
    );

    let src = ((bounds + Vec4::new(-1.0, -1.0, 1.0, 1.0)) * Vec4::new(s.x, s.y, s.x, s.y))
        .clamp(Vec4::ZERO, Vec4::ONE);
    let dst = src * 2.0 - 1.0;

    let vertex = |x: f32, y: f32, u: f32, v: f32| RectVertex {
        position: [x, -y, 0.5, 1.0],
        tex_coord: [u, v],
    };

    [
        vertex(dst.x, dst.y, src.x, src.y),
        vertex(dst.z, dst.y, src.z, src.y),
        vertex(dst.x, dst.w, src.x, src.w),
        vertex(dst.z, dst.w, src.z, src.w),
    ]
}
