//! Per-batch draw planning.
//!
//! [`plan`] turns a draw request into every key, constant payload and pass the draw needs. It
//! doesn't touch the device: executing the plan is up to the [`Renderer`](crate::Renderer).
use glam::{IVec4, UVec2, Vec2, Vec4};
use gs::regs::{AlphaFail, AlphaOperand, DepthTest};
use gs::{PrimClass, Psm, RectVertex, Registers, Vertex, VertexTrace, VideoMode};
use tinyvec::ArrayVec;
use tracing::debug;

use crate::config::{Config, Title};
use crate::data::{GsConstants, PsConstants, VsConstants};
use crate::date::{self, DateInput, DateStrategy};
use crate::device::Caps;
use crate::emulate::{KeyBuilder, alpha_test};
use crate::error::DrawError;
use crate::selector::{
    AlphaTestMode, BlendSelector, Colclip, DateShader, DepthStencilSelector, GsSelector, PsSelector,
    SamplerSelector, VsSelector,
};
use crate::state::Topology;

#[cfg(test)]
pub mod fixture;

/// A colour or depth target of a draw.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a, T> {
    pub texture: &'a T,
    /// Size in host pixels.
    pub size: UVec2,
    /// Host pixels per GS pixel.
    pub scale: Vec2,
    /// The texture cache suspects the game renders to this target with a half pixel offset.
    pub likely_offset: bool,
    pub offset_modifiers: Vec2,
}

impl<'a, T> Target<'a, T> {
    pub fn new(texture: &'a T, size: UVec2) -> Self {
        Self {
            texture,
            size,
            scale: Vec2::ONE,
            likely_offset: false,
            offset_modifiers: Vec2::ONE,
        }
    }
}

/// The texture sampled by a draw, as resolved by the texture cache.
#[derive(Debug, Clone, Copy)]
pub struct TextureSource<'a, T> {
    pub texture: &'a T,
    pub palette: Option<&'a T>,
    /// The source is a render target rather than uploaded texture data.
    pub target: bool,
    /// The source is a depth-stencil surface.
    pub depth_stencil: bool,
    /// Size in host texels.
    pub size: Vec2,
    /// Sub-texel offset of target sources relative to the GS texture origin.
    pub realign_offset: Vec2,
    /// The source was flagged by the sprite hack: alpha tests against it are unreliable.
    pub sprite_hack: bool,
}

impl<'a, T> TextureSource<'a, T> {
    pub fn new(texture: &'a T, size: Vec2) -> Self {
        Self {
            texture,
            palette: None,
            target: false,
            depth_stencil: false,
            size,
            realign_offset: Vec2::ZERO,
            sprite_hack: false,
        }
    }
}

/// Shuffle effects detected by the texture cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shuffle {
    /// 16 bit channels are moved between halves of a 32 bit target.
    pub texture: bool,
    /// A single channel is copied into the others.
    pub channel: bool,
}

/// Everything needed to draw one primitive batch.
#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a, T> {
    pub regs: &'a Registers,
    pub trace: &'a VertexTrace,
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
    pub rt: Option<Target<'a, T>>,
    pub ds: Option<Target<'a, T>>,
    pub tex: Option<TextureSource<'a, T>>,
    pub shuffle: Shuffle,
    pub video_mode: VideoMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassKind {
    /// Pixels passing the alpha test, or every pixel without one.
    #[default]
    Main,
    /// Pixels failing the alpha test, with the writes AFAIL allows.
    AlphaFail,
}

/// One draw of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pass {
    pub kind: PassKind,
    /// Subtracts the part of the preceding pass that wrapped around.
    pub negative: bool,
    pub ps: PsSelector,
    pub ps_cb: PsConstants,
    pub blend: BlendSelector,
    pub depth: DepthStencilSelector,
}

impl Pass {
    /// Whether the pass can change anything.
    pub fn writes(&self) -> bool {
        self.blend.writes_color() || self.depth.zwe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    pub vs: VsSelector,
    /// Geometry stage, when the primitive class needs one.
    pub gs: Option<GsSelector>,
    /// Sampler of the texture, for textured draws.
    pub sampler: Option<SamplerSelector>,
    pub palette: bool,
    pub vs_cb: VsConstants,
    pub gs_cb: GsConstants,
    /// Blend factor, in GS units.
    pub afix: u8,
    pub date: DateStrategy,
    pub datm: bool,
    /// Area tagged by the stencil DATE setup.
    pub date_rect: [RectVertex; 4],
    pub target_size: UVec2,
    pub scissor: IVec4,
    pub topology: Topology,
    pub fba_fixup: bool,
    pub passes: ArrayVec<[Pass; 4]>,
}

impl DrawPlan {
    /// Number of passes not counting colclip subtraction passes.
    pub fn pass_count(&self) -> usize {
        self.passes.iter().filter(|p| !p.negative).count()
    }

    /// Number of draw calls issued, including the DATE stencil setup.
    pub fn draw_count(&self) -> usize {
        self.passes.len() + usize::from(self.date.uses_stencil())
    }

    pub fn blend_factor(&self) -> f32 {
        f32::from(self.afix) / f32::from(gs::ONE)
    }

    /// Draws without destination alpha test, when no strategy can be honoured.
    pub fn disable_date(&mut self) {
        self.date = DateStrategy::Off;
        self.vs = self.vs.with_rtcopy(false);
        for pass in self.passes.iter_mut() {
            pass.ps = pass.ps.with_date(DateShader::Off);
            pass.depth = pass.depth.with_date(false).with_date_one(false);
        }
    }
}

/// Rejects draws that are known to break on the hardware renderer.
fn check_supported<T>(req: &DrawRequest<'_, T>, config: &Config) -> Result<(), DrawError> {
    if config.title != Title::Ico {
        return Ok(());
    }

    // the bloom effect of ICO samples an 8H palettized copy of the frame buffer with a sprite
    // covering the whole display, which only works with the software renderer
    if req.tex.is_none() {
        return Ok(());
    }

    let prim = req.regs.env.prim;
    let [_, v1] = req.vertices else {
        return Ok(());
    };

    let ntsc = req.video_mode == VideoMode::Ntsc && v1.u == 8200 && v1.v == 7176;
    let pal = req.video_mode == VideoMode::Pal && v1.u == 8200 && v1.v == 8200;
    let psm = req.regs.context.tex0.psm_mode();
    if req.trace.class == PrimClass::Sprite
        && prim.abe()
        && (ntsc || pal)
        && psm == Some(Psm::T8H)
    {
        return Err(DrawError::UnsupportedDraw("ICO bloom effect"));
    }

    Ok(())
}

fn scissor<T>(req: &DrawRequest<'_, T>, target: &Target<'_, T>) -> IVec4 {
    let rect = if req.shuffle.channel {
        [0.0, 0.0, 1024.0, 1024.0]
    } else {
        req.regs.context.scissor
    };

    let scale = Vec4::new(target.scale.x, target.scale.y, target.scale.x, target.scale.y);
    let scaled = (Vec4::from_array(rect) * scale).as_ivec4();

    IVec4::new(
        scaled.x.max(0),
        scaled.y.max(0),
        scaled.z.min(target.size.x as i32),
        scaled.w.min(target.size.y as i32),
    )
}

/// Masks of the pass drawing the pixels that fail the alpha test.
struct FailMasks {
    depth: bool,
    rgb: bool,
    alpha: bool,
}

pub fn plan<T>(
    req: &DrawRequest<'_, T>,
    caps: Caps,
    config: &Config,
) -> Result<DrawPlan, DrawError> {
    let target = req.ds.as_ref().or(req.rt.as_ref()).ok_or(DrawError::NoRenderTarget)?;
    check_supported(req, config)?;

    let regs = req.regs;
    let context = &regs.context;
    let test = context.test;
    let trace = req.trace;

    let mut b = KeyBuilder::new(req, config, caps);
    b.emulate_frame_buffer();

    // DATE needs an alpha channel to test against
    let frame_psm = b.frame_psm();
    let date_requested = test.date() && frame_psm != Psm::Ct24 && req.rt.is_some();
    let mut date = if date_requested {
        let input = DateInput {
            datm: test.datm(),
            alpha_written: b.blend.wa(),
            alpha_test: test.ate(),
            alpha: trace.alpha,
            class: trace.class,
            index_count: req.indices.len(),
            stencil: caps.stencil && req.ds.is_some(),
        };

        date::select(&input, &config.date, config.accurate_date)
    } else {
        DateStrategy::Off
    };

    b.emulate_blend();
    b.emulate_zbuffer();
    b.emulate_geometry(target);
    b.emulate_pixel_output();

    match date {
        DateStrategy::OnePixel => b.depth = b.depth.with_date(true).with_date_one(true),
        DateStrategy::Stencil => b.depth = b.depth.with_date(true),
        DateStrategy::Copy => {
            b.vs = b.vs.with_rtcopy(true);
            b.ps = b.ps.with_date(DateShader::from_datm(test.datm()));
        }
        DateStrategy::Off | DateStrategy::Skip => (),
    }

    let sprite_hack = req.tex.as_ref().is_some_and(|t| t.sprite_hack);
    let first_pass = test.first_pass_needed();
    let second_pass = test.second_pass_needed();

    // when depth and alpha writes don't depend on draw order, the draw can be split in a colour
    // pass ignoring the alpha test and a second pass handling the remaining writes
    let (mut rgba_then_z, mut rgb_then_za) = (false, false);
    if first_pass && second_pass {
        debug!("complex alpha test: {:?} with {:?}", test.atst(), test.afail());
        let commutative_depth = (b.depth.ztst() == DepthTest::GEqual && trace.eq.z)
            || b.depth.ztst() == DepthTest::Always;
        let commutative_alpha = b.alpha_c != AlphaOperand::Dest;

        rgba_then_z = test.afail() == AlphaFail::FbOnly && commutative_depth;
        rgb_then_za = test.afail() == AlphaFail::RgbOnly && commutative_depth && commutative_alpha;
    }

    let mut aref = 0.0;
    if rgba_then_z {
        b.depth = b.depth.with_zwe(false);
    } else if rgb_then_za {
        b.depth = b.depth.with_zwe(false);
        b.blend = b.blend.with_wa(false);
    } else if test.ate() {
        let (mode, r) = alpha_test(test.atst(), test.aref(), sprite_hack);
        b.ps = b.ps.with_atst(mode);
        aref = r;
    }

    // one write per pixel is enough when only writes flipping the destination alpha MSB pass
    if config.hacks.alpha_stencil && date == DateStrategy::Stencil && b.blend.wa() && !test.ate() {
        let fba = b.ps.fba();
        if !fba {
            let mode = if !test.datm() {
                AlphaTestMode::GEqual
            } else if sprite_hack {
                AlphaTestMode::Off
            } else {
                AlphaTestMode::LEqual
            };

            b.ps = b.ps.with_atst(mode);
            aref = f32::from(gs::ONE);
        }

        // FBA sets the alpha MSB on write, so DATM=1 pixels keep passing after the first write
        if !(fba && test.datm()) {
            b.depth = b.depth.with_date_one(true);
            date = DateStrategy::OnePixel;
        }
    }

    b.emulate_texture_sampler();

    let mut passes = ArrayVec::new();
    let mut push = |pass: Pass, colclip: bool| {
        passes.push(pass);
        if colclip {
            passes.push(Pass {
                negative: true,
                ps: pass.ps.with_colclip(Colclip::Negative),
                blend: pass.blend.with_negative(true),
                ..pass
            });
        }
    };

    let main = Pass {
        kind: PassKind::Main,
        negative: false,
        ps: b.ps,
        ps_cb: b.ps_cb.with_aref(aref),
        blend: b.blend,
        depth: b.depth,
    };

    if first_pass {
        push(main, b.colclip_wrap);
    }

    if second_pass {
        let split = rgba_then_z || rgb_then_za;
        let atst = if split { test.atst() } else { test.atst().inverted() };
        let (mode, aref) = alpha_test(atst, test.aref(), sprite_hack);

        let zmsk = context.zbuf.zmsk();
        let mut masks = FailMasks {
            depth: b.depth.zwe(),
            rgb: b.blend.wr() || b.blend.wg() || b.blend.wb(),
            alpha: b.blend.wa(),
        };

        match test.afail() {
            AlphaFail::Keep => {
                masks = FailMasks {
                    depth: false,
                    rgb: false,
                    alpha: false,
                }
            }
            AlphaFail::FbOnly => masks.depth = false,
            AlphaFail::ZbOnly => (masks.rgb, masks.alpha) = (false, false),
            AlphaFail::RgbOnly => (masks.depth, masks.alpha) = (false, false),
        }

        if rgba_then_z {
            masks = FailMasks {
                depth: !zmsk,
                rgb: false,
                alpha: false,
            };
        } else if rgb_then_za {
            masks = FailMasks {
                depth: !zmsk,
                rgb: false,
                alpha: context.frame.channel_written(3),
            };
        }

        let blend = if masks.rgb {
            b.blend
        } else {
            b.blend.with_wr(false).with_wg(false).with_wb(false)
        };

        let pass = Pass {
            kind: PassKind::AlphaFail,
            negative: false,
            ps: b.ps.with_atst(mode),
            ps_cb: b.ps_cb.with_aref(aref),
            blend: blend.with_wa(masks.alpha),
            depth: b.depth.with_zwe(masks.depth),
        };

        if pass.writes() {
            if regs.env.pabe.pabe() {
                debug!("alpha fail pass with PABE");
            }

            push(pass, b.colclip_wrap);
        }
    }

    Ok(DrawPlan {
        vs: b.vs,
        gs: b.needs_geometry_stage().then_some(b.gs),
        sampler: req.tex.is_some().then_some(b.sampler),
        palette: req.tex.as_ref().is_some_and(|t| t.palette.is_some()),
        vs_cb: b.vs_cb,
        gs_cb: b.gs_cb,
        afix: b.afix,
        date,
        datm: test.datm(),
        date_rect: date::stencil_rect(trace, target.size, target.scale),
        target_size: target.size,
        scissor: scissor(req, target),
        topology: trace.class.into(),
        fba_fixup: config.fba && context.fba.fba() && req.rt.is_some(),
        passes,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Hacks;
    use crate::plan::fixture::{Fixture, RT, SIZE};
    use crate::selector::{DepthFormat, TextureFx};
    use gs::regs::{AlphaTest, ColorOperand, Frame, Tex0, WrapMode, Zbuf};
    use gs::trace::AlphaRange;

    const CAPS: Caps = Caps {
        stencil: true,
        depth32: true,
    };

    fn plan_of(fixture: &Fixture) -> DrawPlan {
        plan(&fixture.request(), CAPS, &Config::default()).unwrap()
    }

    /// Written colour, alpha and depth.
    fn masks(pass: &Pass) -> (bool, bool, bool) {
        let blend = pass.blend;
        (
            blend.wr() || blend.wg() || blend.wb(),
            blend.wa(),
            pass.depth.zwe(),
        )
    }

    fn blending(fixture: &mut Fixture) {
        let regs = &mut fixture.regs;
        regs.env.prim = regs.env.prim.with_abe(true);
        regs.context.alpha = regs
            .context
            .alpha
            .with_a(ColorOperand::Source)
            .with_b(ColorOperand::Dest)
            .with_d(ColorOperand::Dest);
    }

    struct Row {
        ate: bool,
        atst: AlphaTest,
        afail: AlphaFail,
        ztst: DepthTest,
        c: AlphaOperand,
        colclip: bool,
        passes: &'static [(PassKind, bool, (bool, bool, bool))],
    }

    const ALL: (bool, bool, bool) = (true, true, true);
    const COLOR: (bool, bool, bool) = (true, true, false);
    const DEPTH: (bool, bool, bool) = (false, false, true);

    #[rustfmt::skip]
    const ROWS: &[Row] = &[
        Row { ate: false, atst: AlphaTest::Always, afail: AlphaFail::Keep, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, ALL)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::FbOnly, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, COLOR), (PassKind::AlphaFail, false, DEPTH)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::FbOnly, ztst: DepthTest::Greater, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, ALL), (PassKind::AlphaFail, false, COLOR)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::Keep, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, ALL)] },
        Row { ate: true, atst: AlphaTest::Never, afail: AlphaFail::FbOnly, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::AlphaFail, false, COLOR)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::ZbOnly, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, ALL), (PassKind::AlphaFail, false, DEPTH)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::RgbOnly, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: false,
              passes: &[(PassKind::Main, false, (true, false, false)), (PassKind::AlphaFail, false, (false, true, true))] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::RgbOnly, ztst: DepthTest::Always, c: AlphaOperand::Dest, colclip: false,
              passes: &[(PassKind::Main, false, ALL), (PassKind::AlphaFail, false, (true, false, false))] },
        Row { ate: false, atst: AlphaTest::Always, afail: AlphaFail::Keep, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: true,
              passes: &[(PassKind::Main, false, ALL), (PassKind::Main, true, ALL)] },
        Row { ate: true, atst: AlphaTest::GEqual, afail: AlphaFail::FbOnly, ztst: DepthTest::Always, c: AlphaOperand::Source, colclip: true,
              passes: &[(PassKind::Main, false, COLOR), (PassKind::Main, true, COLOR), (PassKind::AlphaFail, false, DEPTH), (PassKind::AlphaFail, true, DEPTH)] },
    ];

    #[test]
    fn pass_table() {
        for (i, row) in ROWS.iter().enumerate() {
            let mut fixture = Fixture::triangle();
            let context = &mut fixture.regs.context;
            context.test = context
                .test
                .with_ate(row.ate)
                .with_atst(row.atst)
                .with_aref(0x40)
                .with_afail(row.afail)
                .with_ztst(row.ztst);
            context.alpha = context.alpha.with_c(row.c);

            if row.colclip {
                blending(&mut fixture);
            } else {
                fixture.regs.env.colclamp = fixture.regs.env.colclamp.with_clamp(true);
            }

            let plan = plan_of(&fixture);
            let passes: Vec<_> = plan
                .passes
                .iter()
                .map(|p| (p.kind, p.negative, masks(p)))
                .collect();

            assert_eq!(passes, row.passes, "row {i}");
            assert_eq!(plan.draw_count(), row.passes.len(), "row {i}");
        }
    }

    #[test]
    fn split_alpha_test_polarity() {
        let mut fixture = Fixture::triangle();
        let test = &mut fixture.regs.context.test;
        *test = test
            .with_ate(true)
            .with_atst(AlphaTest::GEqual)
            .with_aref(0x40)
            .with_afail(AlphaFail::FbOnly);

        // order independent: colour ignores the test, depth follows it
        let plan = plan_of(&fixture);
        assert_eq!(plan.pass_count(), 2);
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::Off);
        assert_eq!(plan.passes[1].ps.atst(), AlphaTestMode::GEqual);

        // order dependent: second pass draws the rejected pixels
        fixture.regs.context.test = fixture.regs.context.test.with_ztst(DepthTest::Greater);
        let plan = plan_of(&fixture);
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::GEqual);
        assert_eq!(plan.passes[1].ps.atst(), AlphaTestMode::LEqual);
        assert_eq!(plan.passes[1].ps_cb.fog_color_aref.w, 63.9);
    }

    #[test]
    fn opaque_textured_triangle() {
        let fixture = Fixture::triangle().textured();
        let plan = plan_of(&fixture);

        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.date, DateStrategy::Off);
        let pass = plan.passes[0];
        assert!(!pass.blend.abe());
        assert!(!pass.blend.desc().enabled);
        // modulating by constant 1.0 is a plain copy
        assert_eq!(pass.ps.tfx(), TextureFx::Decal);
        assert!(plan.sampler.is_some());
        assert_eq!(plan.gs, None);

        let mut tinted = Fixture::triangle().textured();
        tinted.trace.color_min = [0x40, 0x80, 0x80, 0x80];
        assert_eq!(plan_of(&tinted).passes[0].ps.tfx(), TextureFx::Modulate);
    }

    #[test]
    fn untextured_draws_use_no_texture_function() {
        let plan = plan_of(&Fixture::triangle());
        assert_eq!(plan.passes[0].ps.tfx(), TextureFx::None);
        assert_eq!(plan.sampler, None);
    }

    #[test]
    fn wrap_modes_share_keys() {
        let mut repeat = Fixture::triangle().textured();
        let mut clamp = Fixture::triangle().textured();
        repeat.regs.context.clamp = repeat.regs.context.clamp.with_wms(WrapMode::Repeat);
        clamp.regs.context.clamp = clamp.regs.context.clamp.with_wms(WrapMode::Clamp);

        let (a, b) = (plan_of(&repeat), plan_of(&clamp));
        assert_eq!(a.passes[0].ps, b.passes[0].ps);
        assert_ne!(a.sampler, b.sampler);

        let mut region = Fixture::triangle().textured();
        region.regs.context.clamp = region.regs.context.clamp.with_wms(WrapMode::RegionClamp);
        let c = plan_of(&region);
        assert_eq!(c.passes[0].ps.wms(), WrapMode::RegionClamp);
        assert!(c.passes[0].ps.point_sampler());
    }

    #[test]
    fn equivalent_blends_share_keys() {
        let mut zero = Fixture::triangle();
        blending(&mut zero);
        zero.regs.context.alpha = zero.regs.context.alpha.with_b(ColorOperand::Zero);

        let mut reserved = Fixture::triangle();
        blending(&mut reserved);
        reserved.regs.context.alpha = reserved
            .regs
            .context
            .alpha
            .with_b(ColorOperand::Reserved)
            .with_fix(0x33);

        assert_eq!(plan_of(&zero).passes[0].blend, plan_of(&reserved).passes[0].blend);
    }

    #[test]
    fn keys_are_deterministic() {
        let fixture = Fixture::sprites(8).textured();
        assert_eq!(plan_of(&fixture), plan_of(&fixture));
    }

    #[test]
    fn depth_textures_are_not_filtered() {
        let mut fixture = Fixture::triangle().textured();
        fixture.trace.linear = true;
        fixture.regs.context.tex0 = Tex0::from_bits(fixture.regs.context.tex0.to_bits() | (0x31 << 20));

        let plan = plan_of(&fixture);
        let ps = plan.passes[0].ps;
        assert!(!ps.ltf());
        assert!(ps.point_sampler());
        assert!(!plan.sampler.unwrap().ltf());

        let mut req = fixture.request();
        if let Some(tex) = &mut req.tex {
            tex.target = true;
        }
        let plan = super::plan(&req, CAPS, &Config::default()).unwrap();
        assert_eq!(plan.passes[0].ps.depth_fmt(), DepthFormat::Integral);
    }

    #[test]
    fn frames_without_alpha() {
        let mut fixture = Fixture::triangle();
        blending(&mut fixture);
        fixture.regs.context.alpha = fixture.regs.context.alpha.with_c(AlphaOperand::Dest);
        fixture.regs.context.frame = Frame::from_bits(0x1 << 24);
        fixture.trace.alpha.max = 0x40;

        let plan = plan_of(&fixture);
        // destination alpha reads as 0x80, which turns the blend into a plain write
        let pass = plan.passes[0];
        assert!(!pass.blend.wa());
        assert!(!pass.blend.abe());
        assert_eq!(plan.afix, 0x80);
        assert_eq!(plan.blend_factor(), 1.0);
    }

    #[test]
    fn pabe_disables_blending() {
        let mut fixture = Fixture::triangle();
        blending(&mut fixture);
        fixture.regs.env.colclamp = fixture.regs.env.colclamp.with_clamp(true);
        assert!(plan_of(&fixture).passes[0].blend.abe());

        fixture.regs.env.pabe = fixture.regs.env.pabe.with_pabe(true);
        assert!(!plan_of(&fixture).passes[0].blend.abe());
    }

    #[test]
    fn out_of_range_depth_always_passes() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_ztst(DepthTest::GEqual);
        // Z16
        fixture.regs.context.zbuf = Zbuf::from_bits(0x2 << 24);
        fixture.trace.eq.z = false;
        fixture.trace.min.z = 0x1_0000;
        fixture.trace.max.z = 0x2_0000;
        assert_eq!(plan_of(&fixture).passes[0].depth.ztst(), DepthTest::Always);

        fixture.trace.min.z = 0x100;
        assert_eq!(plan_of(&fixture).passes[0].depth.ztst(), DepthTest::GEqual);

        // every vertex at the maximum
        fixture.trace.eq.z = true;
        for v in &mut fixture.vertices {
            v.z = 0xFFFF;
        }
        assert_eq!(plan_of(&fixture).passes[0].depth.ztst(), DepthTest::Always);
    }

    #[test]
    fn geometry_stage() {
        let plan = plan_of(&Fixture::sprites(1));
        assert_eq!(plan.gs.map(|gs| gs.prim()), Some(PrimClass::Sprite));
        assert_eq!(plan.topology, Topology::LineList);

        let mut flat = Fixture::triangle();
        flat.regs.env.prim = flat.regs.env.prim.with_iip(false);
        assert!(plan_of(&flat).gs.is_some());
        assert!(plan_of(&Fixture::triangle()).gs.is_none());
    }

    #[test]
    fn vertex_constants() {
        let plan = plan_of(&Fixture::triangle());
        let sx = 2.0 / (640.0 * 16.0);
        assert_eq!(plan.vs_cb.vertex_scale.x, sx);
        assert_eq!(plan.vs_cb.vertex_offset.w, -1.0);
        assert_eq!(plan.gs_cb.point_size.x, 16.0 * sx);
        assert_eq!(plan.target_size, SIZE);
    }

    #[test]
    fn scissor_is_clipped_to_the_target() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.scissor = [-16.0, 8.0, 2048.0, 100.0];
        assert_eq!(plan_of(&fixture).scissor, IVec4::new(0, 8, 640, 100));

        fixture.shuffle.channel = true;
        assert_eq!(plan_of(&fixture).scissor, IVec4::new(0, 0, 640, 448));
    }

    #[test]
    fn date_strategies() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);

        fixture.trace.alpha = AlphaRange { min: 200, max: 255 };
        let plan = plan_of(&fixture);
        assert_eq!(plan.date, DateStrategy::OnePixel);
        assert!(plan.passes[0].depth.date_one());

        fixture.trace.alpha = AlphaRange { min: 0, max: 255 };
        let plan = plan_of(&fixture);
        assert_eq!(plan.date, DateStrategy::Stencil);
        assert!(plan.passes[0].depth.date());
        assert!(!plan.passes[0].depth.date_one());

        let no_stencil = Caps {
            stencil: false,
            ..CAPS
        };
        let plan = super::plan(&fixture.request(), no_stencil, &Config::default()).unwrap();
        assert_eq!(plan.date, DateStrategy::Copy);
        assert!(plan.vs.rtcopy());
        assert_eq!(plan.passes[0].ps.date(), DateShader::Datm0);
        assert!(!plan.passes[0].depth.date());
    }

    #[test]
    fn date_needs_an_alpha_channel() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);
        fixture.regs.context.frame = Frame::from_bits(0x1 << 24);
        assert_eq!(plan_of(&fixture).date, DateStrategy::Off);

        // nothing written to alpha and no alpha test
        let mut masked = Fixture::triangle();
        masked.regs.context.test = masked.regs.context.test.with_date(true);
        masked.regs.context.frame = Frame::from_bits(0xFF00_0000 << 32);
        assert_eq!(plan_of(&masked).date, DateStrategy::Skip);
    }

    fn alpha_stencil(fixture: &Fixture, sprite_hack: bool) -> DrawPlan {
        let config = Config {
            hacks: Hacks {
                alpha_stencil: true,
                ..Hacks::default()
            },
            ..Config::default()
        };

        let mut req = fixture.request();
        if let Some(tex) = req.tex.as_mut() {
            tex.sprite_hack = sprite_hack;
        }

        plan(&req, CAPS, &config).unwrap()
    }

    #[test]
    fn alpha_stencil_hack() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);

        let plan = alpha_stencil(&fixture, false);
        assert_eq!(plan.date, DateStrategy::OnePixel);
        assert!(plan.passes[0].depth.date_one());
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::GEqual);
        assert_eq!(plan.passes[0].ps_cb.fog_color_aref.w, 128.0);

        fixture.regs.context.test = fixture.regs.context.test.with_datm(true);
        let plan = alpha_stencil(&fixture, false);
        assert_eq!(plan.date, DateStrategy::OnePixel);
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::LEqual);
        assert_eq!(plan.passes[0].ps_cb.fog_color_aref.w, 128.0);
    }

    #[test]
    fn alpha_stencil_hack_with_sprite_hack() {
        let mut fixture = Fixture::triangle().textured();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true).with_datm(true);

        let plan = alpha_stencil(&fixture, true);
        assert_eq!(plan.date, DateStrategy::OnePixel);
        assert!(plan.passes[0].depth.date_one());
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::Off);
    }

    #[test]
    fn alpha_stencil_hack_with_fba() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);
        fixture.regs.context.fba = fixture.regs.context.fba.with_fba(true);

        // no alpha test, a single write per pixel still holds
        let plan = alpha_stencil(&fixture, false);
        assert_eq!(plan.date, DateStrategy::OnePixel);
        assert!(plan.passes[0].depth.date_one());
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::Off);

        fixture.regs.context.test = fixture.regs.context.test.with_datm(true);
        let plan = alpha_stencil(&fixture, false);
        assert_eq!(plan.date, DateStrategy::Stencil);
        assert!(plan.passes[0].depth.date());
        assert!(!plan.passes[0].depth.date_one());
        assert_eq!(plan.passes[0].ps.atst(), AlphaTestMode::Off);
    }

    #[test]
    fn date_rect_follows_the_depth_buffer() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);
        fixture.trace.min.position = Vec2::new(0.0, 0.0);
        fixture.trace.max.position = Vec2::new(319.0, 223.0);

        let mut req = fixture.request();
        req.rt = Some(Target::new(&RT, SIZE * 2));
        let plan = super::plan(&req, CAPS, &Config::default()).unwrap();

        // (319 + 1) / 640 and (223 + 1) / 448
        let [.., bottom_right] = plan.date_rect;
        assert_eq!(bottom_right.tex_coord, [0.5, 0.5]);
        assert_eq!(plan.target_size, SIZE);
    }

    #[test]
    fn disabling_date_clears_every_pass() {
        let mut fixture = Fixture::triangle();
        fixture.regs.context.test = fixture.regs.context.test.with_date(true);
        let mut plan = plan(
            &fixture.request(),
            Caps {
                stencil: false,
                ..CAPS
            },
            &Config::default(),
        )
        .unwrap();

        plan.disable_date();
        assert!(!plan.vs.rtcopy());
        assert!(plan.passes.iter().all(|p| p.ps.date() == DateShader::Off));
    }

    #[test]
    fn fba_fixup() {
        let mut fixture = Fixture::triangle();
        assert!(!plan_of(&fixture).fba_fixup);

        fixture.regs.context.fba = fixture.regs.context.fba.with_fba(true);
        let plan = plan_of(&fixture);
        assert!(plan.fba_fixup);
        assert!(plan.passes[0].ps.fba());
    }

    #[test]
    fn ico_bloom_is_rejected() {
        let mut fixture = Fixture::sprites(1).textured();
        fixture.regs.env.prim = fixture.regs.env.prim.with_abe(true);
        fixture.regs.context.tex0 = Tex0::from_bits(fixture.regs.context.tex0.to_bits() | (0x1B << 20));
        fixture.vertices[1].u = 8200;
        fixture.vertices[1].v = 7176;

        let config = Config {
            title: Title::Ico,
            ..Config::default()
        };

        assert!(matches!(
            plan(&fixture.request(), CAPS, &config),
            Err(DrawError::UnsupportedDraw(_))
        ));
        assert!(plan(&fixture.request(), CAPS, &Config::default()).is_ok());

        fixture.video_mode = VideoMode::Pal;
        assert!(plan(&fixture.request(), CAPS, &config).is_ok());
    }

    #[test]
    fn no_target_is_an_error() {
        let mut fixture = Fixture::triangle();
        fixture.rt = false;
        fixture.ds = false;
        assert!(matches!(
            plan(&fixture.request(), CAPS, &Config::default()),
            Err(DrawError::NoRenderTarget)
        ));
    }
}
