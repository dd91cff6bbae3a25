//! Pixel storage modes.
use strum::{FromRepr, VariantArray};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u8)]
pub enum Psm {
    Ct32  = 0x00,
    Ct24  = 0x01,
    Ct16  = 0x02,
    Ct16S = 0x0A,
    T8    = 0x13,
    T4    = 0x14,
    T8H   = 0x1B,
    T4HL  = 0x24,
    T4HH  = 0x2C,
    Z32   = 0x30,
    Z24   = 0x31,
    Z16   = 0x32,
    Z16S  = 0x3A,
}

/// Colour layout class of a storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorFormat {
    Rgba32  = 0,
    Rgb24   = 1,
    Rgba16  = 2,
    Indexed = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsmInfo {
    pub bpp: u32,
    pub format: ColorFormat,
    /// Number of palette entries, zero for direct colour.
    pub palette: u32,
    pub depth: bool,
}

impl Psm {
    pub fn info(self) -> PsmInfo {
        let (bpp, format, palette, depth) = match self {
            Self::Ct32 => (32, ColorFormat::Rgba32, 0, false),
            Self::Ct24 => (32, ColorFormat::Rgb24, 0, false),
            Self::Ct16 | Self::Ct16S => (16, ColorFormat::Rgba16, 0, false),
            Self::T8 | Self::T8H => (8, ColorFormat::Indexed, 256, false),
            Self::T4 | Self::T4HL | Self::T4HH => (4, ColorFormat::Indexed, 16, false),
            Self::Z32 => (32, ColorFormat::Rgba32, 0, true),
            Self::Z24 => (32, ColorFormat::Rgb24, 0, true),
            Self::Z16 | Self::Z16S => (16, ColorFormat::Rgba16, 0, true),
        };

        PsmInfo {
            bpp,
            format,
            palette,
            depth,
        }
    }
}
