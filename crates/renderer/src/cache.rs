//! Shader permutation and state object caches.
//!
//! Permutations are compiled on first use and kept for the lifetime of the renderer. There is no
//! eviction: the number of distinct keys a game produces is bounded and small.
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::device::{Device, ShaderMacro, Stage};
use crate::error::CompileError;
use crate::selector::{
    BlendSelector, DepthStencilSelector, GsSelector, PsSelector, SamplerSelector, VsSelector,
};
use crate::state::{BlendDesc, DepthStencilDesc, SamplerDesc};

/// Shader template a permutation is compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// The texture and blending emulation shaders.
    TextureFx,
    /// Full screen conversion shaders.
    Convert,
}

/// Supplies raw template text. Compilation itself is up to the device.
pub trait ShaderSource {
    fn template(&self, program: Program) -> &str;
}

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub tfx: String,
    pub convert: String,
}

impl ShaderSource for Templates {
    fn template(&self, program: Program) -> &str {
        match program {
            Program::TextureFx => &self.tfx,
            Program::Convert => &self.convert,
        }
    }
}

/// Conversion shaders used by the DATE stencil setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertShader {
    Vertex,
    /// Tags pixels whose destination alpha MSB is clear.
    Datm0,
    /// Tags pixels whose destination alpha MSB is set.
    Datm1,
}

impl ConvertShader {
    pub fn datm(datm: bool) -> Self {
        if datm { Self::Datm1 } else { Self::Datm0 }
    }
}

/// A key identifying one compiled shader.
pub trait Permutation: Copy + Eq + Hash + Debug {
    fn stage(&self) -> Stage;
    fn program(&self) -> Program;
    fn entry(&self) -> &'static str;
    fn macros(&self) -> Vec<ShaderMacro>;

    #[doc(hidden)]
    fn slot<D: Device>(shaders: &mut Shaders<D>) -> &mut FxHashMap<Self, D::Shader>;
}

impl Permutation for VsSelector {
    fn stage(&self) -> Stage {
        Stage::Vertex
    }

    fn program(&self) -> Program {
        Program::TextureFx
    }

    fn entry(&self) -> &'static str {
        "vs_main"
    }

    fn macros(&self) -> Vec<ShaderMacro> {
        VsSelector::macros(self)
    }

    fn slot<D: Device>(shaders: &mut Shaders<D>) -> &mut FxHashMap<Self, D::Shader> {
        &mut shaders.vs
    }
}

impl Permutation for GsSelector {
    fn stage(&self) -> Stage {
        Stage::Geometry
    }

    fn program(&self) -> Program {
        Program::TextureFx
    }

    fn entry(&self) -> &'static str {
        "gs_main"
    }

    fn macros(&self) -> Vec<ShaderMacro> {
        GsSelector::macros(self)
    }

    fn slot<D: Device>(shaders: &mut Shaders<D>) -> &mut FxHashMap<Self, D::Shader> {
        &mut shaders.gs
    }
}

impl Permutation for PsSelector {
    fn stage(&self) -> Stage {
        Stage::Pixel
    }

    fn program(&self) -> Program {
        Program::TextureFx
    }

    fn entry(&self) -> &'static str {
        "ps_main"
    }

    fn macros(&self) -> Vec<ShaderMacro> {
        PsSelector::macros(self)
    }

    fn slot<D: Device>(shaders: &mut Shaders<D>) -> &mut FxHashMap<Self, D::Shader> {
        &mut shaders.ps
    }
}

impl Permutation for ConvertShader {
    fn stage(&self) -> Stage {
        match self {
            Self::Vertex => Stage::Vertex,
            Self::Datm0 | Self::Datm1 => Stage::Pixel,
        }
    }

    fn program(&self) -> Program {
        Program::Convert
    }

    fn entry(&self) -> &'static str {
        match self {
            Self::Vertex => "vs_main",
            Self::Datm0 => "ps_datm0",
            Self::Datm1 => "ps_datm1",
        }
    }

    fn macros(&self) -> Vec<ShaderMacro> {
        Vec::new()
    }

    fn slot<D: Device>(shaders: &mut Shaders<D>) -> &mut FxHashMap<Self, D::Shader> {
        &mut shaders.convert
    }
}

/// Compiled shaders, one map per key type.
pub struct Shaders<D: Device> {
    vs: FxHashMap<VsSelector, D::Shader>,
    gs: FxHashMap<GsSelector, D::Shader>,
    ps: FxHashMap<PsSelector, D::Shader>,
    convert: FxHashMap<ConvertShader, D::Shader>,
}

impl<D: Device> Default for Shaders<D> {
    fn default() -> Self {
        Self {
            vs: FxHashMap::default(),
            gs: FxHashMap::default(),
            ps: FxHashMap::default(),
            convert: FxHashMap::default(),
        }
    }
}

impl<D: Device> Shaders<D> {
    pub fn len(&self) -> usize {
        self.vs.len() + self.gs.len() + self.ps.len() + self.convert.len()
    }
}

/// State objects of the DATE stencil setup draw.
pub struct DateStates<D: Device> {
    pub depth_stencil: D::State,
    pub blend: D::State,
}

pub struct Cache<D: Device> {
    shaders: Shaders<D>,
    blend: FxHashMap<BlendSelector, D::State>,
    depth_stencil: FxHashMap<DepthStencilSelector, D::State>,
    samplers: FxHashMap<SamplerSelector, D::State>,
    date: Option<DateStates<D>>,
    max_anisotropy: u8,
    paltex: bool,
}

impl<D: Device> Cache<D> {
    pub fn new(max_anisotropy: u8, paltex: bool) -> Self {
        Self {
            shaders: Shaders::default(),
            blend: FxHashMap::default(),
            depth_stencil: FxHashMap::default(),
            samplers: FxHashMap::default(),
            date: None,
            max_anisotropy,
            paltex,
        }
    }

    /// Number of compiled shaders.
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Returns the shader for `key`, compiling it on first use.
    pub fn shader<K: Permutation>(
        &mut self,
        device: &mut D,
        source: &impl ShaderSource,
        key: K,
    ) -> Result<&D::Shader, CompileError> {
        let len = self.shaders.len();
        match K::slot(&mut self.shaders).entry(key) {
            Entry::Occupied(o) => Ok(o.into_mut()),
            Entry::Vacant(v) => {
                tracing::trace!("compiling permutation {len}: {key:?}");
                let shader = device.compile_shader(
                    key.stage(),
                    source.template(key.program()),
                    key.entry(),
                    &key.macros(),
                )?;

                Ok(v.insert(shader))
            }
        }
    }

    pub fn blend_state(&mut self, device: &mut D, key: BlendSelector) -> &D::State {
        match self.blend.entry(key) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => v.insert(device.create_blend_state(&key.desc())),
        }
    }

    pub fn depth_stencil_state(&mut self, device: &mut D, key: DepthStencilSelector) -> &D::State {
        match self.depth_stencil.entry(key) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => v.insert(device.create_depth_stencil_state(&key.desc())),
        }
    }

    pub fn sampler_state(&mut self, device: &mut D, key: SamplerSelector) -> &D::State {
        match self.samplers.entry(key) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => {
                let desc: SamplerDesc = key.desc(self.max_anisotropy, self.paltex);
                v.insert(device.create_sampler_state(&desc))
            }
        }
    }

    pub fn date_states(&mut self, device: &mut D) -> &DateStates<D> {
        self.date.get_or_insert_with(|| DateStates {
            depth_stencil: device.create_depth_stencil_state(&DepthStencilDesc::date_setup()),
            blend: device.create_blend_state(&BlendDesc::no_writes()),
        })
    }
}
