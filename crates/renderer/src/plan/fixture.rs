//! Draw requests for tests.
use glam::{UVec2, Vec2};
use gs::regs::{DepthTest, PrimType, Tex0, Test};
use gs::trace::{AlphaRange, Equality, TracePoint};
use gs::{PrimClass, Registers, Vertex, VertexTrace, VideoMode};

use crate::plan::{DrawRequest, Shuffle, Target, TextureSource};

pub const RT: u32 = 1;
pub const DS: u32 = 2;
pub const TEX: u32 = 3;
pub const PALETTE: u32 = 4;

pub const SIZE: UVec2 = UVec2::new(640, 448);

pub struct Fixture {
    pub regs: Registers,
    pub trace: VertexTrace,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textured: bool,
    pub palette: bool,
    pub rt: bool,
    pub ds: bool,
    pub shuffle: Shuffle,
    pub video_mode: VideoMode,
}

impl Fixture {
    /// A gouraud shaded triangle without any tests or blending, depth test always passing.
    pub fn triangle() -> Self {
        let mut regs = Registers::default();
        regs.env.prim = regs.env.prim.with_prim(PrimType::Triangle).with_iip(true);
        regs.context.test = Test::default()
            .with_zte(true)
            .with_ztst(DepthTest::Always);
        regs.context.scissor = [0.0, 0.0, 640.0, 448.0];

        let trace = VertexTrace {
            class: PrimClass::Triangle,
            min: TracePoint {
                position: Vec2::new(10.0, 10.0),
                z: 0,
            },
            max: TracePoint {
                position: Vec2::new(100.0, 100.0),
                z: 0,
            },
            alpha: AlphaRange { min: 0, max: 0xFF },
            color_min: [0x80; 4],
            eq: Equality { rgba: true, z: true },
            linear: false,
        };

        Self {
            regs,
            trace,
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1, 2],
            textured: false,
            palette: false,
            rt: true,
            ds: true,
            shuffle: Shuffle::default(),
            video_mode: VideoMode::Ntsc,
        }
    }

    /// A batch of `count` sprites.
    pub fn sprites(count: usize) -> Self {
        let mut fixture = Self::triangle();
        fixture.regs.env.prim = fixture.regs.env.prim.with_prim(PrimType::Sprite);
        fixture.trace.class = PrimClass::Sprite;
        fixture.vertices = vec![Vertex::default(); 2 * count];
        fixture.indices = (0..2 * count as u32).collect();
        fixture
    }

    pub fn textured(mut self) -> Self {
        self.regs.env.prim = self.regs.env.prim.with_tme(true);
        // 256x256
        self.regs.context.tex0 = Tex0::from_bits((8 << 26) | (8 << 30));
        self.textured = true;
        self
    }

    pub fn request(&self) -> DrawRequest<'_, u32> {
        let tex = self.textured.then(|| TextureSource {
            palette: self.palette.then_some(&PALETTE),
            ..TextureSource::new(&TEX, Vec2::new(256.0, 256.0))
        });

        DrawRequest {
            regs: &self.regs,
            trace: &self.trace,
            vertices: &self.vertices,
            indices: &self.indices,
            rt: self.rt.then(|| Target::new(&RT, SIZE)),
            ds: self.ds.then(|| Target::new(&DS, SIZE)),
            tex,
            shuffle: self.shuffle,
            video_mode: self.video_mode,
        }
    }
}
