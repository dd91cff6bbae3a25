//! Drawing registers of the GS.
//!
//! Only the fields the hardware renderer looks at are described. Everything else in the raw
//! register value is carried along untouched.
use bitos::bitos;
use bitos::integer::{u4, u6, u10};
use strum::VariantArray;

use crate::psm::Psm;
use crate::trace::{PrimClass, VertexTrace};

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum PrimType {
    #[default]
    Point         = 0x0,
    Line          = 0x1,
    LineStrip     = 0x2,
    Triangle      = 0x3,
    TriangleStrip = 0x4,
    TriangleFan   = 0x5,
    Sprite        = 0x6,
    Reserved      = 0x7,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prim {
    #[bits(0..3)]
    pub prim: PrimType,
    /// Gouraud shading.
    #[bits(3)]
    pub iip: bool,
    /// Texture mapping.
    #[bits(4)]
    pub tme: bool,
    /// Fogging.
    #[bits(5)]
    pub fge: bool,
    /// Alpha blending.
    #[bits(6)]
    pub abe: bool,
    /// Antialiasing.
    #[bits(7)]
    pub aa1: bool,
    /// Texture coordinates are given as UV instead of STQ.
    #[bits(8)]
    pub fst: bool,
    #[bits(9)]
    pub ctxt: bool,
    #[bits(10)]
    pub fix: bool,
}

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum AlphaTest {
    #[default]
    Never    = 0x0,
    Always   = 0x1,
    Less     = 0x2,
    LEqual   = 0x3,
    Equal    = 0x4,
    GEqual   = 0x5,
    Greater  = 0x6,
    NotEqual = 0x7,
}

impl AlphaTest {
    /// The test that passes exactly the pixels this one rejects.
    pub fn inverted(self) -> Self {
        match self {
            Self::Never => Self::Always,
            Self::Always => Self::Never,
            Self::Less => Self::GEqual,
            Self::LEqual => Self::Greater,
            Self::Equal => Self::NotEqual,
            Self::GEqual => Self::Less,
            Self::Greater => Self::LEqual,
            Self::NotEqual => Self::Equal,
        }
    }
}

/// What happens to a pixel failing the alpha test.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum AlphaFail {
    /// Nothing is written.
    #[default]
    Keep    = 0x0,
    /// Only the frame buffer (RGBA) is written.
    FbOnly  = 0x1,
    /// Only the Z buffer is written.
    ZbOnly  = 0x2,
    /// Only the RGB channels of the frame buffer are written.
    RgbOnly = 0x3,
}

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum DepthTest {
    #[default]
    Never   = 0x0,
    Always  = 0x1,
    GEqual  = 0x2,
    Greater = 0x3,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Test {
    /// Alpha test enable.
    #[bits(0)]
    pub ate: bool,
    #[bits(1..4)]
    pub atst: AlphaTest,
    /// Alpha reference value.
    #[bits(4..12)]
    pub aref: u8,
    #[bits(12..14)]
    pub afail: AlphaFail,
    /// Destination alpha test enable.
    #[bits(14)]
    pub date: bool,
    /// Destination alpha test mode: pixels whose destination alpha MSB equals DATM pass.
    #[bits(15)]
    pub datm: bool,
    /// Depth test enable.
    #[bits(16)]
    pub zte: bool,
    #[bits(17..19)]
    pub ztst: DepthTest,
}

impl Test {
    /// Whether any pixel can pass the alpha test.
    pub fn first_pass_needed(&self) -> bool {
        !self.ate() || self.atst() != AlphaTest::Never
    }

    /// Whether pixels failing the alpha test still write something.
    pub fn second_pass_needed(&self) -> bool {
        self.ate() && self.atst() != AlphaTest::Always && self.afail() != AlphaFail::Keep
    }
}

/// Operand A, B or D of the blending equation.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum ColorOperand {
    #[default]
    Source   = 0x0,
    Dest     = 0x1,
    Zero     = 0x2,
    Reserved = 0x3,
}

impl ColorOperand {
    /// Reserved operands behave as zero.
    pub fn canonical(self) -> Self {
        match self {
            Self::Reserved => Self::Zero,
            other => other,
        }
    }
}

/// Operand C of the blending equation.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum AlphaOperand {
    #[default]
    Source   = 0x0,
    Dest     = 0x1,
    Fix      = 0x2,
    Reserved = 0x3,
}

/// Blending equation `(A - B) * C + D`.
#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alpha {
    #[bits(0..2)]
    pub a: ColorOperand,
    #[bits(2..4)]
    pub b: ColorOperand,
    #[bits(4..6)]
    pub c: AlphaOperand,
    #[bits(6..8)]
    pub d: ColorOperand,
    #[bits(32..40)]
    pub fix: u8,
}

impl Alpha {
    pub fn is_opaque(&self, amin: u8, amax: u8) -> bool {
        let a = self.a().canonical();
        let b = self.b().canonical();
        let d = self.d().canonical();

        ((a == b || amax == 0) && d == ColorOperand::Dest)
            || (a == ColorOperand::Source && b == d && amin == 0x80 && amax == 0x80)
    }
}

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum TexFunction {
    #[default]
    Modulate   = 0x0,
    Decal      = 0x1,
    Highlight  = 0x2,
    Highlight2 = 0x3,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tex0 {
    #[bits(20..26)]
    pub psm: u6,
    /// Texture width, log2.
    #[bits(26..30)]
    pub tw: u4,
    /// Texture height, log2.
    #[bits(30..34)]
    pub th: u4,
    /// Texture colour component: whether the texture alpha is used.
    #[bits(34)]
    pub tcc: bool,
    #[bits(35..37)]
    pub tfx: TexFunction,
    #[bits(51..55)]
    pub cpsm: u4,
    #[bits(55)]
    pub csm: bool,
}

impl Tex0 {
    pub fn psm_mode(&self) -> Option<Psm> {
        Psm::from_repr(self.psm().value() as u8)
    }

    pub fn clut_psm_mode(&self) -> Option<Psm> {
        Psm::from_repr(self.cpsm().value() as u8)
    }

    pub fn width(&self) -> u32 {
        1 << (self.tw().value() as u32).min(10)
    }

    pub fn height(&self) -> u32 {
        1 << (self.th().value() as u32).min(10)
    }
}

#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, VariantArray)]
pub enum WrapMode {
    #[default]
    Repeat       = 0x0,
    Clamp        = 0x1,
    RegionClamp  = 0x2,
    RegionRepeat = 0x3,
}

impl WrapMode {
    /// Region modes can't be expressed by a hardware sampler.
    pub fn is_region(self) -> bool {
        matches!(self, Self::RegionClamp | Self::RegionRepeat)
    }
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clamp {
    #[bits(0..2)]
    pub wms: WrapMode,
    #[bits(2..4)]
    pub wmt: WrapMode,
    #[bits(4..14)]
    pub minu: u10,
    #[bits(14..24)]
    pub maxu: u10,
    #[bits(24..34)]
    pub minv: u10,
    #[bits(34..44)]
    pub maxv: u10,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zbuf {
    /// Z buffer format, relative to PSMZ32.
    #[bits(24..28)]
    pub psm: u4,
    /// Z writes are masked.
    #[bits(32)]
    pub zmsk: bool,
}

impl Zbuf {
    pub fn psm_mode(&self) -> Option<Psm> {
        Psm::from_repr(0x30 | self.psm().value() as u8)
    }

    /// Largest Z value the buffer format can represent.
    pub fn max_z(&self) -> u32 {
        match self.psm_mode() {
            Some(Psm::Z32) => 0xFFFF_FFFF,
            Some(Psm::Z24) => 0x00FF_FFFF,
            _ => 0xFFFF,
        }
    }
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    #[bits(24..30)]
    pub psm: u6,
    /// Frame buffer write mask: set bits are not written.
    #[bits(32..64)]
    pub fbmsk: u32,
}

impl Frame {
    pub fn psm_mode(&self) -> Option<Psm> {
        Psm::from_repr(self.psm().value() as u8)
    }

    /// Whether a channel (0 = R .. 3 = A) receives any write.
    pub fn channel_written(&self, channel: usize) -> bool {
        (self.fbmsk() >> (channel * 8)) & 0xFF != 0xFF
    }
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XyOffset {
    /// Offset in 1/16 pixels.
    #[bits(0..16)]
    pub ofx: u16,
    #[bits(32..48)]
    pub ofy: u16,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fba {
    #[bits(0)]
    pub fba: bool,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pabe {
    #[bits(0)]
    pub pabe: bool,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColClamp {
    #[bits(0)]
    pub clamp: bool,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Texa {
    #[bits(0..8)]
    pub ta0: u8,
    /// Alpha expansion mode: black pixels become transparent.
    #[bits(15)]
    pub aem: bool,
    #[bits(32..40)]
    pub ta1: u8,
}

#[bitos(64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FogCol {
    #[bits(0..8)]
    pub fcr: u8,
    #[bits(8..16)]
    pub fcg: u8,
    #[bits(16..24)]
    pub fcb: u8,
}

/// Scissor rectangle in GS pixels, `[x0, y0, x1, y1]`.
pub type Scissor = [f32; 4];

/// Registers of the active drawing context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub test: Test,
    pub alpha: Alpha,
    pub tex0: Tex0,
    pub clamp: Clamp,
    pub zbuf: Zbuf,
    pub frame: Frame,
    pub xyoffset: XyOffset,
    pub fba: Fba,
    pub scissor: Scissor,
}

/// Registers shared by both drawing contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Env {
    pub prim: Prim,
    pub pabe: Pabe,
    pub colclamp: ColClamp,
    pub texa: Texa,
    pub fogcol: FogCol,
}

/// Read-only register snapshot for one primitive batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registers {
    pub context: Context,
    pub env: Env,
}

impl Registers {
    /// Whether blending can't change the frame buffer contents beyond a plain write.
    pub fn is_opaque(&self, trace: &VertexTrace) -> bool {
        let prim = self.env.prim;
        if prim.aa1() {
            return false;
        }

        if !prim.abe() {
            return true;
        }

        let alpha = self.context.alpha;
        let (mut amin, mut amax) = (0, 0xFF);
        if alpha.a().canonical() != alpha.b().canonical() {
            match alpha.c() {
                AlphaOperand::Source => (amin, amax) = (trace.alpha.min, trace.alpha.max),
                AlphaOperand::Dest => {
                    if matches!(self.context.frame.psm_mode(), Some(Psm::Ct24 | Psm::Z24)) {
                        (amin, amax) = (0x80, 0x80);
                    }
                }
                AlphaOperand::Fix => (amin, amax) = (alpha.fix(), alpha.fix()),
                AlphaOperand::Reserved => (),
            }
        }

        alpha.is_opaque(amin, amax)
    }

    /// Whether antialiased lines force blending on.
    pub fn blend_enabled(&self, class: PrimClass) -> bool {
        let prim = self.env.prim;
        prim.abe() || (prim.aa1() && class == PrimClass::Line)
    }
}
