//! Redundant state change elimination.
//!
//! [`DeviceContext`] owns the device and mirrors every piece of state the core sets on it. A state
//! change only reaches the device when it differs from the mirrored value, so the mirror always
//! equals the actual device state as long as nothing else touches the device.
use glam::{IVec4, UVec2};

use crate::device::{Device, SLOTS, Stage};
use crate::error::DrawError;
use crate::state::Topology;

/// Last state applied to the device.
struct Applied<D: Device> {
    targets: Option<(Option<D::Texture>, Option<D::Texture>)>,
    viewport: Option<UVec2>,
    scissor: Option<IVec4>,
    topology: Option<Topology>,
    shaders: [Option<D::Shader>; 3],
    constants: [Vec<u8>; 3],
    blend: Option<(D::State, u32)>,
    depth_stencil: Option<(D::State, u8)>,
    resources: [Option<D::Texture>; SLOTS],
    samplers: [Option<D::State>; SLOTS],
}

impl<D: Device> Default for Applied<D> {
    fn default() -> Self {
        Self {
            targets: None,
            viewport: None,
            scissor: None,
            topology: None,
            shaders: Default::default(),
            constants: Default::default(),
            blend: None,
            depth_stencil: None,
            resources: Default::default(),
            samplers: Default::default(),
        }
    }
}

pub struct DeviceContext<D: Device> {
    device: D,
    applied: Applied<D>,
    /// Resources and samplers are gathered per slot and bound together before a draw.
    resources: [Option<D::Texture>; SLOTS],
    samplers: [Option<D::State>; SLOTS],
}

impl<D: Device> DeviceContext<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            applied: Applied::default(),
            resources: Default::default(),
            samplers: Default::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Direct device access, for commands that don't touch mirrored state.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Forgets the mirror, forcing every following state change through. Needed after something
    /// else changed the device state.
    pub fn invalidate(&mut self) {
        self.applied = Applied::default();
    }

    /// Binds the targets, with a viewport covering `size` and an optional scissor rectangle.
    pub fn set_render_targets(
        &mut self,
        rt: Option<&D::Texture>,
        ds: Option<&D::Texture>,
        size: UVec2,
        scissor: Option<IVec4>,
    ) -> Result<(), DrawError> {
        if rt.is_none() && ds.is_none() {
            return Err(DrawError::NoRenderTarget);
        }

        let targets = (rt.cloned(), ds.cloned());
        if self.applied.targets.as_ref() != Some(&targets) {
            self.device.set_render_targets(rt, ds);
            self.applied.targets = Some(targets);
        }

        if self.applied.viewport != Some(size) {
            self.device.set_viewport(size);
            self.applied.viewport = Some(size);
        }

        let scissor = scissor.unwrap_or(IVec4::new(0, 0, size.x as i32, size.y as i32));
        if self.applied.scissor != Some(scissor) {
            self.device.set_scissor(scissor);
            self.applied.scissor = Some(scissor);
        }

        Ok(())
    }

    pub fn set_topology(&mut self, topology: Topology) {
        if self.applied.topology != Some(topology) {
            self.device.set_topology(topology);
            self.applied.topology = Some(topology);
        }
    }

    /// Vertex data changes with every batch and is always uploaded.
    pub fn set_vertices(&mut self, data: &[u8], stride: usize) {
        self.device.set_vertex_buffer(data, stride);
    }

    pub fn set_indices(&mut self, indices: &[u32]) {
        self.device.set_index_buffer(indices);
    }

    pub fn set_shader(&mut self, stage: Stage, shader: Option<&D::Shader>) {
        let slot = &mut self.applied.shaders[stage.index()];
        if slot.as_ref() != shader {
            self.device.set_shader(stage, shader);
            *slot = shader.cloned();
        }
    }

    pub fn set_constants(&mut self, stage: Stage, data: &[u8]) {
        let slot = &mut self.applied.constants[stage.index()];
        if slot.as_slice() != data {
            self.device.set_constant_buffer(stage, data);
            slot.clear();
            slot.extend_from_slice(data);
        }
    }

    pub fn set_blend_state(&mut self, state: &D::State, factor: f32) {
        let factor = factor.to_bits();
        if self
            .applied
            .blend
            .as_ref()
            .is_none_or(|(s, f)| s != state || *f != factor)
        {
            self.device.set_blend_state(state, f32::from_bits(factor));
            self.applied.blend = Some((state.clone(), factor));
        }
    }

    pub fn set_depth_stencil_state(&mut self, state: &D::State, stencil_ref: u8) {
        if self
            .applied
            .depth_stencil
            .as_ref()
            .is_none_or(|(s, r)| s != state || *r != stencil_ref)
        {
            self.device.set_depth_stencil_state(state, stencil_ref);
            self.applied.depth_stencil = Some((state.clone(), stencil_ref));
        }
    }

    pub fn set_resource(&mut self, slot: usize, texture: Option<&D::Texture>) {
        self.resources[slot] = texture.cloned();
    }

    pub fn set_sampler(&mut self, slot: usize, sampler: Option<&D::State>) {
        self.samplers[slot] = sampler.cloned();
    }

    fn flush_bindings(&mut self) {
        if self.applied.resources != self.resources {
            self.device.set_shader_resources(&self.resources);
            self.applied.resources.clone_from(&self.resources);
        }

        if self.applied.samplers != self.samplers {
            self.device.set_samplers(&self.samplers);
            self.applied.samplers.clone_from(&self.samplers);
        }
    }

    pub fn begin_scene(&mut self) {
        self.device.begin_scene();
    }

    pub fn end_scene(&mut self) {
        self.device.end_scene();
    }

    pub fn draw(&mut self, vertex_count: u32) {
        self.flush_bindings();
        self.device.draw(vertex_count);
    }

    pub fn draw_indexed(&mut self, index_count: u32) {
        self.flush_bindings();
        self.device.draw_indexed(index_count);
    }

    /// Unbinds a texture from every resource slot, so it can be used as a target.
    pub fn unbind_resource(&mut self, texture: &D::Texture) {
        for slot in &mut self.resources {
            if slot.as_ref() == Some(texture) {
                *slot = None;
            }
        }

        if self.applied.resources.iter().any(|r| r.as_ref() == Some(texture)) {
            self.device.set_shader_resources(&self.resources);
            self.applied.resources.clone_from(&self.resources);
        }
    }
}
