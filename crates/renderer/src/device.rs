//! The device abstraction the core draws through.
#[cfg(test)]
pub mod recording;

use std::fmt::Debug;

use glam::{IVec4, UVec2};

use crate::error::CompileError;
use crate::state::{BlendDesc, DepthStencilDesc, SamplerDesc, Topology};

/// Number of pixel shader resource and sampler slots the core binds.
pub const SLOTS: usize = 3;

/// Pixel shader slot of the sampled texture.
pub const SLOT_TEXTURE: usize = 0;
/// Pixel shader slot of the palette.
pub const SLOT_PALETTE: usize = 1;
/// Pixel shader slot of the render target copy used by shader DATE.
pub const SLOT_RT_COPY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Geometry,
    Pixel,
}

impl Stage {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A `#define` handed to the shader compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderMacro {
    pub name: &'static str,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caps {
    /// Depth-stencil targets carry a stencil buffer.
    pub stencil: bool,
    /// A 32 bit floating point depth format is available.
    pub depth32: bool,
}

/// Primitive operations of the host GPU.
///
/// Every call is a real state change or command. Redundancy elimination happens above this layer,
/// in [`DeviceContext`](crate::context::DeviceContext).
pub trait Device {
    type Texture: Clone + PartialEq + Debug;
    type Shader: Clone + PartialEq + Debug;
    type State: Clone + PartialEq + Debug;

    fn caps(&self) -> Caps;

    fn compile_shader(
        &mut self,
        stage: Stage,
        source: &str,
        entry: &'static str,
        macros: &[ShaderMacro],
    ) -> Result<Self::Shader, CompileError>;
    fn create_blend_state(&mut self, desc: &BlendDesc) -> Self::State;
    fn create_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Self::State;
    fn create_sampler_state(&mut self, desc: &SamplerDesc) -> Self::State;

    fn set_render_targets(&mut self, rt: Option<&Self::Texture>, ds: Option<&Self::Texture>);
    fn set_viewport(&mut self, size: UVec2);
    /// `[x0, y0, x1, y1]` in target pixels.
    fn set_scissor(&mut self, rect: IVec4);
    fn set_vertex_buffer(&mut self, data: &[u8], stride: usize);
    fn set_index_buffer(&mut self, indices: &[u32]);
    fn set_topology(&mut self, topology: Topology);
    fn set_shader(&mut self, stage: Stage, shader: Option<&Self::Shader>);
    fn set_constant_buffer(&mut self, stage: Stage, data: &[u8]);
    fn set_shader_resources(&mut self, resources: &[Option<Self::Texture>; SLOTS]);
    fn set_samplers(&mut self, samplers: &[Option<Self::State>; SLOTS]);
    fn set_blend_state(&mut self, state: &Self::State, factor: f32);
    fn set_depth_stencil_state(&mut self, state: &Self::State, stencil_ref: u8);

    fn begin_scene(&mut self);
    fn end_scene(&mut self);
    fn draw(&mut self, vertex_count: u32);
    fn draw_indexed(&mut self, index_count: u32);

    fn clear_stencil(&mut self, ds: &Self::Texture, value: u8);
    fn is_multisampled(&self, texture: &Self::Texture) -> bool;
    /// Borrows a scratch render target shaped like `like`. Returned through [`Device::recycle`].
    fn create_render_target(&mut self, like: &Self::Texture) -> Option<Self::Texture>;
    fn copy_rect(&mut self, src: &Self::Texture, dst: &Self::Texture, rect: IVec4);
    /// Resolves a multisampled target into a scratch texture.
    fn resolve(&mut self, texture: &Self::Texture) -> Option<Self::Texture>;
    fn recycle(&mut self, texture: Self::Texture);
    /// Frame buffer alpha correction over the target.
    fn update_fba(&mut self, rt: &Self::Texture);
}
