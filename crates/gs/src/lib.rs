//! Register-level state of the PlayStation 2 Graphics Synthesizer, as consumed by the hardware
//! renderer.

pub mod psm;
pub mod regs;
pub mod trace;
pub mod vertex;

pub use psm::{ColorFormat, Psm, PsmInfo};
pub use regs::Registers;
pub use trace::{PrimClass, VertexTrace};
pub use vertex::{RectVertex, Vertex};

/// One in GS colour and alpha units.
pub const ONE: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    #[default]
    Ntsc,
    Pal,
}
