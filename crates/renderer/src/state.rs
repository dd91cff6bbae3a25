//! Device independent fixed-function state, derived from selectors.
use gs::PrimClass;
use gs::regs::{AlphaOperand, ColorOperand, DepthTest};

use crate::selector::{BlendSelector, DepthStencilSelector, SamplerSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

impl From<PrimClass> for Topology {
    fn from(value: PrimClass) -> Self {
        match value {
            PrimClass::Point => Self::PointList,
            PrimClass::Line => Self::LineList,
            PrimClass::Triangle => Self::TriangleList,
            // expanded into quads by the geometry stage
            PrimClass::Sprite => Self::LineList,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    Constant,
    InvConstant,
    DstColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

/// Colour blending. Alpha is never blended: the source alpha replaces the destination alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub enabled: bool,
    pub op: BlendOp,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub write_mask: ColorMask,
}

/// One of the 27 `(A - B) * C + D` operand combinations, as a fixed-function equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Equation {
    pub op: BlendOp,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    /// The blender can only get close to the GS result.
    pub approximate: bool,
}

impl Equation {
    const fn exact(op: BlendOp, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            op,
            src,
            dst,
            approximate: false,
        }
    }

    const fn approx(op: BlendOp, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            op,
            src,
            dst,
            approximate: true,
        }
    }

    pub fn new(a: ColorOperand, b: ColorOperand, c: AlphaOperand, d: ColorOperand) -> Self {
        use BlendFactor::*;
        use BlendOp::*;
        use ColorOperand::{Dest as Cd, Source as Cs};

        let (f, inv_f) = match c {
            AlphaOperand::Source => (SrcAlpha, InvSrcAlpha),
            AlphaOperand::Dest => (DstAlpha, InvDstAlpha),
            AlphaOperand::Fix | AlphaOperand::Reserved => (Constant, InvConstant),
        };

        let a = a.canonical();
        let b = b.canonical();
        let d = d.canonical();
        if a == b {
            return match d {
                Cs => Self::exact(Add, One, Zero),
                Cd => Self::exact(Add, Zero, One),
                _ => Self::exact(Add, Zero, Zero),
            };
        }

        match (a, b, d) {
            (Cs, Cd, Cs) => Self::approx(Subtract, One, f),
            (Cs, Cd, Cd) => Self::exact(Add, f, inv_f),
            (Cs, Cd, _) => Self::exact(Subtract, f, f),
            (Cs, _, Cs) => Self::approx(Add, One, Zero),
            (Cs, _, Cd) => Self::exact(Add, f, One),
            (Cs, _, _) => Self::exact(Add, f, Zero),
            (Cd, Cs, Cs) => Self::exact(Add, inv_f, f),
            (Cd, Cs, Cd) => Self::approx(RevSubtract, f, One),
            (Cd, Cs, _) => Self::exact(RevSubtract, f, f),
            (Cd, _, Cs) => Self::exact(Add, One, f),
            // the shader outputs C, see `BlendSelector::is_clr1`
            (Cd, _, Cd) => Self::exact(Add, DstColor, f),
            (Cd, _, _) => Self::exact(Add, Zero, f),
            (_, Cs, Cs) => Self::exact(Add, inv_f, Zero),
            (_, Cs, Cd) => Self::exact(RevSubtract, f, One),
            (_, Cs, _) => Self::exact(RevSubtract, f, Zero),
            (_, Cd, Cs) => Self::exact(Subtract, One, f),
            (_, Cd, Cd) => Self::exact(Add, Zero, inv_f),
            (_, _, _) => Self::exact(Subtract, Zero, f),
        }
    }
}

impl BlendSelector {
    /// Whether the equation is `Cd * (1 + C)`.
    pub fn is_clr1(&self) -> bool {
        self.a().canonical() == ColorOperand::Dest
            && self.b().canonical() == ColorOperand::Zero
            && self.d().canonical() == ColorOperand::Dest
    }

    pub fn equation(&self) -> Equation {
        Equation::new(self.a(), self.b(), self.c(), self.d())
    }

    pub fn write_mask(&self) -> ColorMask {
        ColorMask {
            r: self.wr(),
            g: self.wg(),
            b: self.wb(),
            a: self.wa(),
        }
    }

    pub fn desc(&self) -> BlendDesc {
        if !self.abe() {
            return BlendDesc {
                enabled: false,
                op: BlendOp::Add,
                src: BlendFactor::One,
                dst: BlendFactor::Zero,
                write_mask: self.write_mask(),
            };
        }

        let equation = self.equation();
        if equation.approximate {
            tracing::trace!(
                "blend equation ({:?} - {:?}) * {:?} + {:?} is approximated",
                self.a(),
                self.b(),
                self.c(),
                self.d()
            );
        }

        let op = match (self.negative(), equation.op) {
            (true, BlendOp::Add) => BlendOp::RevSubtract,
            (true, BlendOp::RevSubtract) => BlendOp::Add,
            (_, op) => op,
        };

        BlendDesc {
            enabled: true,
            op,
            src: equation.src,
            dst: equation.dst,
            write_mask: self.write_mask(),
        }
    }
}

impl BlendDesc {
    /// Blend state of the stencil tagging draw: nothing reaches the colour target.
    pub fn no_writes() -> Self {
        Self {
            enabled: false,
            op: BlendOp::Add,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            write_mask: ColorMask::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Always,
    Equal,
    GreaterEqual,
    Greater,
}

impl From<DepthTest> for CompareFunc {
    fn from(value: DepthTest) -> Self {
        match value {
            DepthTest::Never => Self::Never,
            DepthTest::Always => Self::Always,
            DepthTest::GEqual => Self::GreaterEqual,
            DepthTest::Greater => Self::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
}

/// Stencil state, shared by front and back faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilDesc {
    pub func: CompareFunc,
    pub pass: StencilOp,
    pub read_mask: u8,
    pub write_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunc,
    pub stencil: Option<StencilDesc>,
}

impl DepthStencilSelector {
    pub fn desc(&self) -> DepthStencilDesc {
        let stencil = self.date().then(|| StencilDesc {
            func: CompareFunc::Equal,
            pass: if self.date_one() {
                StencilOp::Zero
            } else {
                StencilOp::Keep
            },
            read_mask: 1,
            write_mask: 1,
        });

        let depth_test = self.ztst() != DepthTest::Always || self.zwe();
        DepthStencilDesc {
            depth_test,
            depth_write: depth_test && self.zwe(),
            depth_func: if depth_test {
                self.ztst().into()
            } else {
                CompareFunc::Always
            },
            stencil,
        }
    }

    /// Stencil reference used with this state.
    pub fn stencil_ref(&self) -> u8 {
        1
    }
}

impl DepthStencilDesc {
    /// Depth-stencil state of the stencil tagging draw.
    pub fn date_setup() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_func: CompareFunc::Always,
            stencil: Some(StencilDesc {
                func: CompareFunc::Always,
                pass: StencilOp::Replace,
                read_mask: 1,
                write_mask: 1,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

impl SamplerSelector {
    pub fn desc(&self, max_anisotropy: u8, paltex: bool) -> SamplerDesc {
        let address = |wrap| {
            if wrap {
                AddressMode::Wrap
            } else {
                AddressMode::Clamp
            }
        };

        let filter = match (self.ltf(), max_anisotropy) {
            (false, _) => Filter::Point,
            (true, 0) => Filter::Linear,
            (true, _) if paltex => Filter::Linear,
            (true, n) => Filter::Anisotropic(n),
        };

        SamplerDesc {
            filter,
            address_u: address(self.tau()),
            address_v: address(self.tav()),
        }
    }
}
