//! A device that records every call, for tests.
use glam::{IVec4, UVec2};

use crate::device::{Caps, Device, SLOTS, ShaderMacro, Stage};
use crate::error::CompileError;
use crate::state::{BlendDesc, DepthStencilDesc, SamplerDesc, Topology};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Compile {
        stage: Stage,
        entry: &'static str,
        macros: Vec<ShaderMacro>,
    },
    CreateBlendState(BlendDesc),
    CreateDepthStencilState(DepthStencilDesc),
    CreateSamplerState(SamplerDesc),
    SetRenderTargets(Option<u32>, Option<u32>),
    SetViewport(UVec2),
    SetScissor(IVec4),
    SetVertexBuffer { len: usize, stride: usize },
    SetIndexBuffer(usize),
    SetTopology(Topology),
    SetShader(Stage, Option<u32>),
    SetConstantBuffer(Stage, Vec<u8>),
    SetShaderResources([Option<u32>; SLOTS]),
    SetSamplers([Option<u32>; SLOTS]),
    SetBlendState(u32, f32),
    SetDepthStencilState(u32, u8),
    BeginScene,
    EndScene,
    Draw(u32),
    DrawIndexed(u32),
    ClearStencil(u32, u8),
    CreateRenderTarget(u32),
    CopyRect { src: u32, dst: u32 },
    Resolve(u32),
    Recycle(u32),
    UpdateFba(u32),
}

pub struct RecordingDevice {
    pub caps: Caps,
    pub calls: Vec<Call>,
    /// Compiling this entry point fails.
    pub failing_entry: Option<&'static str>,
    /// Scratch targets can be created.
    pub scratch: bool,
    pub multisampled: bool,
    /// Blend and depth-stencil descriptors, indexed by state id.
    pub states: Vec<StateDesc>,
    next_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateDesc {
    Blend(BlendDesc),
    DepthStencil(DepthStencilDesc),
    Sampler(SamplerDesc),
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            caps: Caps {
                stencil: true,
                depth32: true,
            },
            calls: Vec::new(),
            failing_entry: None,
            scratch: true,
            multisampled: false,
            states: Vec::new(),
            next_id: 1000,
        }
    }
}

impl RecordingDevice {
    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| f(c)).count()
    }

    pub fn draws(&self) -> usize {
        self.count(|c| matches!(c, Call::Draw(_) | Call::DrawIndexed(_)))
    }

    pub fn compiles(&self) -> usize {
        self.count(|c| matches!(c, Call::Compile { .. }))
    }

    /// Descriptor of the state object with the given id.
    pub fn state(&self, id: u32) -> StateDesc {
        self.states[id as usize]
    }

    /// Blend descriptors bound by every `SetBlendState`, in order.
    pub fn bound_blends(&self) -> Vec<BlendDesc> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetBlendState(id, _) => match self.state(*id) {
                    StateDesc::Blend(desc) => Some(desc),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Depth-stencil descriptors bound by every `SetDepthStencilState`, in order.
    pub fn bound_depth_stencils(&self) -> Vec<DepthStencilDesc> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetDepthStencilState(id, _) => match self.state(*id) {
                    StateDesc::DepthStencil(desc) => Some(desc),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn state_id(&mut self, desc: StateDesc) -> u32 {
        self.states.push(desc);
        self.states.len() as u32 - 1
    }
}

impl Device for RecordingDevice {
    type Texture = u32;
    type Shader = u32;
    type State = u32;

    fn caps(&self) -> Caps {
        self.caps
    }

    fn compile_shader(
        &mut self,
        stage: Stage,
        _source: &str,
        entry: &'static str,
        macros: &[ShaderMacro],
    ) -> Result<u32, CompileError> {
        self.calls.push(Call::Compile {
            stage,
            entry,
            macros: macros.to_vec(),
        });

        if self.failing_entry == Some(entry) {
            return Err(CompileError::Rejected {
                stage,
                entry,
                message: "rejected by test".into(),
            });
        }

        Ok(self.id())
    }

    fn create_blend_state(&mut self, desc: &BlendDesc) -> u32 {
        self.calls.push(Call::CreateBlendState(*desc));
        self.state_id(StateDesc::Blend(*desc))
    }

    fn create_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> u32 {
        self.calls.push(Call::CreateDepthStencilState(*desc));
        self.state_id(StateDesc::DepthStencil(*desc))
    }

    fn create_sampler_state(&mut self, desc: &SamplerDesc) -> u32 {
        self.calls.push(Call::CreateSamplerState(*desc));
        self.state_id(StateDesc::Sampler(*desc))
    }

    fn set_render_targets(&mut self, rt: Option<&u32>, ds: Option<&u32>) {
        self.calls.push(Call::SetRenderTargets(rt.copied(), ds.copied()));
    }

    fn set_viewport(&mut self, size: UVec2) {
        self.calls.push(Call::SetViewport(size));
    }

    fn set_scissor(&mut self, rect: IVec4) {
        self.calls.push(Call::SetScissor(rect));
    }

    fn set_vertex_buffer(&mut self, data: &[u8], stride: usize) {
        self.calls.push(Call::SetVertexBuffer {
            len: data.len(),
            stride,
        });
    }

    fn set_index_buffer(&mut self, indices: &[u32]) {
        self.calls.push(Call::SetIndexBuffer(indices.len()));
    }

    fn set_topology(&mut self, topology: Topology) {
        self.calls.push(Call::SetTopology(topology));
    }

    fn set_shader(&mut self, stage: Stage, shader: Option<&u32>) {
        self.calls.push(Call::SetShader(stage, shader.copied()));
    }

    fn set_constant_buffer(&mut self, stage: Stage, data: &[u8]) {
        self.calls.push(Call::SetConstantBuffer(stage, data.to_vec()));
    }

    fn set_shader_resources(&mut self, resources: &[Option<u32>; SLOTS]) {
        self.calls.push(Call::SetShaderResources(*resources));
    }

    fn set_samplers(&mut self, samplers: &[Option<u32>; SLOTS]) {
        self.calls.push(Call::SetSamplers(*samplers));
    }

    fn set_blend_state(&mut self, state: &u32, factor: f32) {
        self.calls.push(Call::SetBlendState(*state, factor));
    }

    fn set_depth_stencil_state(&mut self, state: &u32, stencil_ref: u8) {
        self.calls.push(Call::SetDepthStencilState(*state, stencil_ref));
    }

    fn begin_scene(&mut self) {
        self.calls.push(Call::BeginScene);
    }

    fn end_scene(&mut self) {
        self.calls.push(Call::EndScene);
    }

    fn draw(&mut self, vertex_count: u32) {
        self.calls.push(Call::Draw(vertex_count));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.calls.push(Call::DrawIndexed(index_count));
    }

    fn clear_stencil(&mut self, ds: &u32, value: u8) {
        self.calls.push(Call::ClearStencil(*ds, value));
    }

    fn is_multisampled(&self, _texture: &u32) -> bool {
        self.multisampled
    }

    fn create_render_target(&mut self, like: &u32) -> Option<u32> {
        self.calls.push(Call::CreateRenderTarget(*like));
        self.scratch.then(|| self.id())
    }

    fn copy_rect(&mut self, src: &u32, dst: &u32, _rect: IVec4) {
        self.calls.push(Call::CopyRect {
            src: *src,
            dst: *dst,
        });
    }

    fn resolve(&mut self, texture: &u32) -> Option<u32> {
        self.calls.push(Call::Resolve(*texture));
        self.scratch.then(|| self.id())
    }

    fn recycle(&mut self, texture: u32) {
        self.calls.push(Call::Recycle(texture));
    }

    fn update_fba(&mut self, rt: &u32) {
        self.calls.push(Call::UpdateFba(*rt));
    }
}
