//! Selector keys: one bitfield value per shader stage or fixed-function state object.
//!
//! Equality and hashing are structural, so two draws with the same requirements share every
//! cached permutation. Unused bits are always zero.
use bitos::bitos;
use gs::PrimClass;
use gs::regs::{AlphaOperand, ColorOperand, DepthTest, TexFunction, WrapMode};
use strum::VariantArray;

use crate::device::ShaderMacro;

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum TextureFx {
    #[default]
    Modulate   = 0x0,
    Decal      = 0x1,
    Highlight  = 0x2,
    Highlight2 = 0x3,
    /// No texture is sampled.
    None       = 0x4,
    Reserved0  = 0x5,
    Reserved1  = 0x6,
    Reserved2  = 0x7,
}

impl From<TexFunction> for TextureFx {
    fn from(value: TexFunction) -> Self {
        match value {
            TexFunction::Modulate => Self::Modulate,
            TexFunction::Decal => Self::Decal,
            TexFunction::Highlight => Self::Highlight,
            TexFunction::Highlight2 => Self::Highlight2,
        }
    }
}

/// Alpha test as performed by the pixel shader, against the reference in the constants.
#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum AlphaTestMode {
    #[default]
    Off       = 0x0,
    /// Discard when alpha is above the reference.
    LEqual    = 0x1,
    /// Discard when alpha is below the reference.
    GEqual    = 0x2,
    Equal     = 0x3,
    NotEqual  = 0x4,
    Reserved0 = 0x5,
    Reserved1 = 0x6,
    Reserved2 = 0x7,
}

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum Colclip {
    #[default]
    Off      = 0x0,
    /// Output the positive part of a wrapping blend.
    Wrap     = 0x1,
    /// Output the part that wrapped around, to be subtracted.
    Negative = 0x2,
    Reserved = 0x3,
}

/// Destination alpha test performed in the shader against a copy of the target.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum DateShader {
    #[default]
    Off      = 0x0,
    Datm0    = 0x1,
    Datm1    = 0x2,
    Reserved = 0x3,
}

impl DateShader {
    pub fn from_datm(datm: bool) -> Self {
        if datm { Self::Datm1 } else { Self::Datm0 }
    }
}

/// Colour format of the frame buffer.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum TargetFormat {
    #[default]
    Rgba32   = 0x0,
    Rgb24    = 0x1,
    Rgba16   = 0x2,
    Reserved = 0x3,
}

/// How a depth formatted source is converted back to colour.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum DepthFormat {
    #[default]
    None     = 0x0,
    Float32  = 0x1,
    Float16  = 0x2,
    Integral = 0x3,
}

#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VsSelector {
    #[bits(0)]
    pub tme: bool,
    #[bits(1)]
    pub fst: bool,
    #[bits(2)]
    pub logz: bool,
    /// The target copy used by shader DATE is sampled.
    #[bits(3)]
    pub rtcopy: bool,
}

#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GsSelector {
    #[bits(0)]
    pub iip: bool,
    #[bits(1..3)]
    pub prim: PrimClass,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PsSelector {
    #[bits(0)]
    pub fst: bool,
    /// Wrap modes that need emulation. Plain repeat and clamp are handled by the sampler.
    #[bits(1..3)]
    pub wms: WrapMode,
    #[bits(3..5)]
    pub wmt: WrapMode,
    /// Colour format class in bits 0..2, index width in bits 2..4.
    #[bits(5..13)]
    pub fmt: u8,
    #[bits(13)]
    pub aem: bool,
    #[bits(14..17)]
    pub tfx: TextureFx,
    #[bits(17)]
    pub tcc: bool,
    #[bits(18..21)]
    pub atst: AlphaTestMode,
    #[bits(21)]
    pub fog: bool,
    /// Blend is `Cd * (1 + C)`: the shader outputs `C` and the blender adds `Cd`.
    #[bits(22)]
    pub clr1: bool,
    #[bits(23)]
    pub fba: bool,
    #[bits(24)]
    pub aout: bool,
    #[bits(25)]
    pub ltf: bool,
    #[bits(26..28)]
    pub colclip: Colclip,
    #[bits(28..30)]
    pub date: DateShader,
    #[bits(30)]
    pub spritehack: bool,
    #[bits(31)]
    pub tcoffsethack: bool,
    #[bits(32)]
    pub point_sampler: bool,
    #[bits(33)]
    pub shuffle: bool,
    #[bits(34..36)]
    pub dfmt: TargetFormat,
    #[bits(36..38)]
    pub depth_fmt: DepthFormat,
    /// The source is a render target.
    #[bits(38)]
    pub rt: bool,
    /// Mask the shuffled 8 bit channels bitwise, with the masks in [`PsConstants::fb_mask`].
    ///
    /// [`PsConstants::fb_mask`]: crate::data::PsConstants::fb_mask
    #[bits(39)]
    pub fbmask: bool,
}

/// Index width part of [`PsSelector::fmt`].
pub mod index {
    pub const NONE: u8 = 0;
    pub const T4HL: u8 = 1;
    pub const T4HH: u8 = 2;
    pub const T8: u8 = 3;

    pub const fn fmt(color: u8, index: u8) -> u8 {
        (color & 0b11) | (index << 2)
    }
}

#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerSelector {
    /// Wrap on U, clamp otherwise.
    #[bits(0)]
    pub tau: bool,
    #[bits(1)]
    pub tav: bool,
    /// Bilinear filtering.
    #[bits(2)]
    pub ltf: bool,
}

#[bitos(16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendSelector {
    #[bits(0)]
    pub abe: bool,
    #[bits(1..3)]
    pub a: ColorOperand,
    #[bits(3..5)]
    pub b: ColorOperand,
    #[bits(5..7)]
    pub c: AlphaOperand,
    #[bits(7..9)]
    pub d: ColorOperand,
    #[bits(9)]
    pub wr: bool,
    #[bits(10)]
    pub wg: bool,
    #[bits(11)]
    pub wb: bool,
    #[bits(12)]
    pub wa: bool,
    /// Subtract the wrapped part of a colclip draw.
    #[bits(13)]
    pub negative: bool,
}

impl BlendSelector {
    pub fn writes_color(&self) -> bool {
        self.wr() || self.wg() || self.wb() || self.wa()
    }

    pub fn with_rgba(self, write: bool) -> Self {
        self.with_wr(write)
            .with_wg(write)
            .with_wb(write)
            .with_wa(write)
    }
}

#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthStencilSelector {
    #[bits(0..2)]
    pub ztst: DepthTest,
    #[bits(2)]
    pub zwe: bool,
    /// Only pixels tagged in the stencil buffer are drawn.
    #[bits(3)]
    pub date: bool,
    /// The first write to a tagged pixel clears its tag.
    #[bits(4)]
    pub date_one: bool,
}

fn flag(name: &'static str, value: bool) -> ShaderMacro {
    ShaderMacro {
        name,
        value: u32::from(value),
    }
}

fn value(name: &'static str, value: impl Into<u32>) -> ShaderMacro {
    ShaderMacro {
        name,
        value: value.into(),
    }
}

impl VsSelector {
    pub fn macros(&self) -> Vec<ShaderMacro> {
        vec![
            flag("VS_TME", self.tme()),
            flag("VS_FST", self.fst()),
            flag("VS_LOGZ", self.logz()),
            flag("VS_RTCOPY", self.rtcopy()),
        ]
    }
}

impl GsSelector {
    pub fn macros(&self) -> Vec<ShaderMacro> {
        vec![
            flag("GS_IIP", self.iip()),
            value("GS_PRIM", self.prim() as u8),
        ]
    }
}

impl PsSelector {
    pub fn macros(&self) -> Vec<ShaderMacro> {
        vec![
            flag("PS_FST", self.fst()),
            value("PS_WMS", self.wms() as u8),
            value("PS_WMT", self.wmt() as u8),
            value("PS_FMT", self.fmt()),
            flag("PS_AEM", self.aem()),
            value("PS_TFX", self.tfx() as u8),
            flag("PS_TCC", self.tcc()),
            value("PS_ATST", self.atst() as u8),
            flag("PS_FOG", self.fog()),
            flag("PS_CLR1", self.clr1()),
            flag("PS_FBA", self.fba()),
            flag("PS_AOUT", self.aout()),
            flag("PS_LTF", self.ltf()),
            value("PS_COLCLIP", self.colclip() as u8),
            value("PS_DATE", self.date() as u8),
            flag("PS_SPRITEHACK", self.spritehack()),
            flag("PS_TCOFFSETHACK", self.tcoffsethack()),
            flag("PS_POINT_SAMPLER", self.point_sampler()),
            flag("PS_SHUFFLE", self.shuffle()),
            value("PS_DFMT", self.dfmt() as u8),
            value("PS_DEPTH_FMT", self.depth_fmt() as u8),
            flag("PS_RT", self.rt()),
            flag("PS_FBMASK", self.fbmask()),
        ]
    }
}
