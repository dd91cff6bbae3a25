//! Derivation of selector keys and constants from the GS state of a draw.
//!
//! Every draw starts from zeroed keys and each emulation step fills in the fields it owns.
use glam::{Vec2, Vec4};
use gs::regs::{AlphaOperand, AlphaTest, ColorOperand, DepthTest, WrapMode};
use gs::{ColorFormat, PrimClass, Psm};
use tracing::{debug, trace};

use crate::config::{Config, HalfPixelOffset};
use crate::data::{GsConstants, PsConstants, VsConstants};
use crate::device::Caps;
use crate::plan::{DrawRequest, Target};
use crate::selector::{
    AlphaTestMode, BlendSelector, Colclip, DepthFormat, DepthStencilSelector, GsSelector,
    PsSelector, SamplerSelector, TargetFormat, TextureFx, VsSelector, index,
};

/// Shader alpha test equivalent to `test` against `aref`.
///
/// Returns the mode and the reference to compare with, which is offset so integer comparisons
/// survive the conversion to normalized floats.
pub fn alpha_test(test: AlphaTest, aref: u8, sprite_hack: bool) -> (AlphaTestMode, f32) {
    let aref = f32::from(aref);
    match test {
        AlphaTest::Never | AlphaTest::Always => (AlphaTestMode::Off, aref),
        AlphaTest::Less if sprite_hack => (AlphaTestMode::Off, aref),
        AlphaTest::Less => (AlphaTestMode::LEqual, aref - 0.1),
        AlphaTest::LEqual => (AlphaTestMode::LEqual, aref + 0.9),
        AlphaTest::GEqual => (AlphaTestMode::GEqual, aref - 0.1),
        AlphaTest::Greater => (AlphaTestMode::GEqual, aref + 0.9),
        AlphaTest::Equal => (AlphaTestMode::Equal, aref),
        AlphaTest::NotEqual => (AlphaTestMode::NotEqual, aref),
    }
}

fn target_format(psm: Psm) -> TargetFormat {
    match psm.info().format {
        ColorFormat::Rgba32 => TargetFormat::Rgba32,
        ColorFormat::Rgb24 => TargetFormat::Rgb24,
        ColorFormat::Rgba16 => TargetFormat::Rgba16,
        ColorFormat::Indexed => TargetFormat::Reserved,
    }
}

pub struct KeyBuilder<'r, 'a, T> {
    req: &'r DrawRequest<'a, T>,
    config: &'r Config,
    caps: Caps,

    pub vs: VsSelector,
    pub gs: GsSelector,
    pub ps: PsSelector,
    pub sampler: SamplerSelector,
    pub blend: BlendSelector,
    pub depth: DepthStencilSelector,

    pub vs_cb: VsConstants,
    pub gs_cb: GsConstants,
    pub ps_cb: PsConstants,

    /// Blend equation operand C, after format fixups.
    pub alpha_c: AlphaOperand,
    pub afix: u8,
    pub colclip_wrap: bool,
}

impl<'r, 'a, T> KeyBuilder<'r, 'a, T> {
    pub fn new(req: &'r DrawRequest<'a, T>, config: &'r Config, caps: Caps) -> Self {
        Self {
            req,
            config,
            caps,
            vs: VsSelector::default(),
            gs: GsSelector::default(),
            ps: PsSelector::default(),
            sampler: SamplerSelector::default(),
            blend: BlendSelector::default(),
            depth: DepthStencilSelector::default(),
            vs_cb: VsConstants::default(),
            gs_cb: GsConstants::default(),
            ps_cb: PsConstants::default(),
            alpha_c: req.regs.context.alpha.c(),
            afix: 0,
            colclip_wrap: false,
        }
    }

    pub fn frame_psm(&self) -> Psm {
        let frame = self.req.regs.context.frame;
        frame.psm_mode().unwrap_or_else(|| {
            trace!("unknown frame format {:#X}", frame.psm().value());
            Psm::Ct32
        })
    }

    /// Write masks and the target format.
    pub fn emulate_frame_buffer(&mut self) {
        let frame = self.req.regs.context.frame;
        self.blend = self
            .blend
            .with_wr(frame.channel_written(0))
            .with_wg(frame.channel_written(1))
            .with_wb(frame.channel_written(2))
            .with_wa(frame.channel_written(3));

        if self.req.shuffle.texture {
            self.ps = self.ps.with_shuffle(true).with_dfmt(TargetFormat::Rgba32);
            self.emulate_texture_shuffle_masks();
        } else {
            self.ps = self.ps.with_dfmt(target_format(self.frame_psm()));
        }
    }

    /// A texture shuffle moves 16 bit channels pairwise, so the 32 bit frame mask has to be
    /// reduced to the 16 bit channels actually written by this half of the shuffle.
    fn emulate_texture_shuffle_masks(&mut self) {
        let context = &self.req.regs.context;
        let m = context.frame.fbmsk();
        let fbmask =
            ((m >> 3) & 0x1F) | ((m >> 6) & 0x3E0) | ((m >> 9) & 0x7C00) | ((m >> 16) & 0x8000);

        // the blue-alpha half of a shuffle starts eight pixels into each 16 pixel column
        let ofx = context.xyoffset.ofx();
        let write_ba = self.req.vertices.first().is_some_and(|v| {
            let pos = v.x.wrapping_sub(ofx) & 0xFF;
            pos > 112 && pos < 136
        });

        let rg_mask = (fbmask & 0xFF) as u8;
        let ba_mask = (fbmask >> 8) as u8;

        let mut blend = self.blend.with_rgba(false);
        if rg_mask != 0xFF {
            blend = if write_ba {
                blend.with_wb(true)
            } else {
                blend.with_wr(true)
            };
        }

        if ba_mask != 0xFF {
            blend = if write_ba {
                blend.with_wa(true)
            } else {
                blend.with_wg(true)
            };
        }

        let partial = |mask: u8| mask != 0 && mask != 0xFF;
        if partial(rg_mask) || partial(ba_mask) {
            debug!("partial texture shuffle mask rg={rg_mask:#X} ba={ba_mask:#X}");
            self.ps = self.ps.with_fbmask(true);
            self.ps_cb.fb_mask = Vec4::new(f32::from(rg_mask), f32::from(ba_mask), 0.0, 0.0);
        }

        self.blend = blend;
    }

    pub fn emulate_blend(&mut self) {
        let regs = self.req.regs;
        let trace = self.req.trace;
        let mut alpha = regs.context.alpha;

        if self.ps.dfmt() == TargetFormat::Rgb24 {
            // no alpha channel to read, destination alpha is always one
            if alpha.c() == AlphaOperand::Dest {
                alpha = alpha.with_c(AlphaOperand::Fix).with_fix(gs::ONE);
            }

            self.blend = self.blend.with_wa(false);
        }

        self.alpha_c = alpha.c();
        if alpha.c() == AlphaOperand::Fix {
            self.afix = alpha.fix();
        }

        if !regs.is_opaque(trace) {
            self.blend = self
                .blend
                .with_abe(regs.blend_enabled(trace.class))
                .with_a(alpha.a().canonical())
                .with_b(alpha.b().canonical())
                .with_c(alpha.c())
                .with_d(alpha.d().canonical());
        }

        // with PABE, blending only happens for alpha >= 0x80, where the shader can't output
        // anything but 1.0: disabling it gives the same result
        let pabe_blend = alpha.a() == ColorOperand::Source
            && alpha.b() == ColorOperand::Dest
            && alpha.c() == AlphaOperand::Source
            && alpha.d() == ColorOperand::Dest;
        if regs.env.pabe.pabe() && pabe_blend {
            self.blend = self.blend.with_abe(false);
        }

        self.colclip_wrap = !regs.env.colclamp.clamp()
            && self.req.tex.is_none()
            && trace.class != PrimClass::Point
            && self.blend.abe()
            && alpha.a().canonical() != alpha.b().canonical();

        if self.colclip_wrap {
            self.ps = self.ps.with_colclip(Colclip::Wrap);
        }

        self.ps = self.ps.with_clr1(self.blend.abe() && self.blend.is_clr1());
    }

    pub fn emulate_zbuffer(&mut self) {
        let context = &self.req.regs.context;
        let trace = self.req.trace;

        if context.test.zte() {
            self.depth = self
                .depth
                .with_ztst(context.test.ztst())
                .with_zwe(!context.zbuf.zmsk());
        } else {
            self.depth = self.depth.with_ztst(DepthTest::Always);
        }

        let max_z = context.zbuf.max_z();
        // the whole batch is out of range, z values are clamped to the maximum
        if self.depth.ztst() != DepthTest::Never && self.depth.zwe() && trace.min.z > max_z {
            debug!(
                "bad z range {}..={} for a {:?} buffer, forcing the depth test to pass",
                trace.min.z,
                trace.max.z,
                context.zbuf.psm_mode()
            );
            self.depth = self.depth.with_ztst(DepthTest::Always);
        }

        let first_z = self.req.vertices.first().map(|v| v.z);
        if self.depth.ztst() == DepthTest::GEqual && trace.eq.z && first_z == Some(max_z) {
            debug!("depth test GEQUAL against max z is always true");
            self.depth = self.depth.with_ztst(DepthTest::Always);
        }
    }

    /// Vertex and geometry stage keys and constants.
    pub fn emulate_geometry(&mut self, target: &Target<'a, T>) {
        let regs = self.req.regs;
        let prim = regs.env.prim;
        let class = self.req.trace.class;

        self.vs = self
            .vs
            .with_tme(prim.tme())
            .with_fst(prim.fst())
            .with_logz(!self.caps.depth32 && self.config.logz);

        self.gs = self.gs.with_iip(prim.iip()).with_prim(class);

        let size = target.size.as_vec2();
        let sx = 2.0 * target.scale.x / (size.x * 16.0);
        let sy = 2.0 * target.scale.y / (size.y * 16.0);
        let ox = f32::from(regs.context.xyoffset.ofx());
        let oy = f32::from(regs.context.xyoffset.ofy());

        let [pcx, pcy] = self.config.pixel_center;
        let mut ox2 = 2.0 * pcx / size.x;
        let mut oy2 = 2.0 * pcy / size.y;

        // the offset hint belongs to the colour target even when the depth buffer sizes the draw
        let hpo = self.config.hacks.half_pixel_offset == HalfPixelOffset::Normal;
        if let Some(rt) = self.req.rt.as_ref().filter(|rt| hpo && rt.likely_offset) {
            if pcx == 0.0 && pcy == 0.0 {
                ox2 = -0.0003;
                oy2 = -0.0003;
            }

            ox2 *= rt.offset_modifiers.x;
            oy2 *= rt.offset_modifiers.y;
        }

        self.vs_cb.vertex_scale = Vec4::new(sx, -sy, 2.0f32.powi(-32), 0.0);
        self.vs_cb.vertex_offset =
            Vec4::new(ox * sx + ox2 + 1.0, -(oy * sy + oy2 + 1.0), 0.0, -1.0);
        self.gs_cb.point_size = Vec2::new(16.0 * sx, 16.0 * sy);
    }

    /// Whether the draw needs the geometry stage.
    pub fn needs_geometry_stage(&self) -> bool {
        let class = self.req.trace.class;
        class != PrimClass::Point && (!self.gs.iip() || class == PrimClass::Sprite)
    }

    /// Frame buffer alpha, alpha output and fog.
    pub fn emulate_pixel_output(&mut self) {
        let regs = self.req.regs;
        let frame = regs.context.frame;

        self.ps = self
            .ps
            .with_fba(regs.context.fba.fba())
            .with_aout(
                !self.req.shuffle.texture
                    && (self.config.hacks.alpha_hack || frame.fbmsk() >> 24 == 0x7F),
            )
            .with_fog(regs.env.prim.fge());

        if regs.env.prim.fge() {
            let fog = regs.env.fogcol;
            let rgb = Vec4::new(
                f32::from(fog.fcr()),
                f32::from(fog.fcg()),
                f32::from(fog.fcb()),
                0.0,
            ) / 255.0;

            self.ps_cb.fog_color_aref = rgb.with_w(self.ps_cb.fog_color_aref.w);
        }
    }

    pub fn emulate_texture_sampler(&mut self) {
        let Some(tex) = &self.req.tex else {
            self.ps = self.ps.with_tfx(TextureFx::None);
            return;
        };

        let regs = self.req.regs;
        let context = &regs.context;
        let trace = self.req.trace;
        let tex0 = context.tex0;
        let clamp = context.clamp;

        let psm = tex0.psm_mode().unwrap_or_else(|| {
            trace!("unknown texture format {:#X}", tex0.psm().value());
            Psm::Ct32
        });
        let info = psm.info();
        let cpsm = if info.palette > 0 {
            tex0.clut_psm_mode().unwrap_or(Psm::Ct32).info()
        } else {
            info
        };

        let wms = clamp.wms();
        let wmt = clamp.wmt();
        let complex = wms.is_region() || wmt.is_region();
        let shader_sampler =
            tex.palette.is_some() || cpsm.format != ColorFormat::Rgba32 || complex || info.depth;

        let mut bilinear = trace.linear;
        if info.depth && bilinear {
            trace!("depth texture can't be filtered, sampling the nearest texel");
            bilinear = false;
        }

        let canonical = |mode: WrapMode| if mode.is_region() { mode } else { WrapMode::Repeat };
        self.ps = self.ps.with_wms(canonical(wms)).with_wmt(canonical(wmt));

        let tw = tex0.width() as f32;
        let th = tex0.height() as f32;
        let wh = Vec4::new(tw, th, tex.size.x, tex.size.y);

        let msk_fix = if complex {
            Vec4::new(
                clamp.minu().value() as f32,
                clamp.minv().value() as f32,
                clamp.maxu().value() as f32,
                clamp.maxv().value() as f32,
            )
        } else {
            Vec4::ZERO
        };

        let texa = regs.env.texa;
        let minf_ta = Vec4::new(
            (msk_fix.x + 0.5) / tw,
            (msk_fix.y + 0.5) / th,
            f32::from(texa.ta0()) / 255.0,
            f32::from(texa.ta1()) / 255.0,
        );

        if self.ps.shuffle() {
            self.ps = self.ps.with_aem(texa.aem());
            if info.depth {
                let fmt = if tex.depth_stencil {
                    DepthFormat::Float32
                } else {
                    DepthFormat::Integral
                };
                self.ps = self.ps.with_depth_fmt(fmt);
            }

            self.ps_cb.minf_ta = minf_ta;
            self.vs_cb.texture_scale_offset.z = tex.realign_offset.x;
            self.vs_cb.texture_scale_offset.w = tex.realign_offset.y;
        } else if tex.target {
            let width = if tex.palette.is_some() {
                match psm {
                    Psm::T4HL => index::T4HL,
                    Psm::T4HH => index::T4HH,
                    _ => index::T8,
                }
            } else {
                index::NONE
            };

            self.ps = self
                .ps
                .with_fmt(index::fmt(cpsm.format as u8, width))
                .with_aem(texa.aem());

            if cpsm.format != ColorFormat::Rgba32 {
                self.ps_cb.minf_ta = minf_ta;
            }

            if tex.depth_stencil {
                let fmt = if info.bpp == 16 {
                    DepthFormat::Float16
                } else {
                    DepthFormat::Float32
                };
                self.ps = self.ps.with_depth_fmt(fmt);
            } else if info.depth {
                self.ps = self.ps.with_depth_fmt(DepthFormat::Integral);
            }

            self.vs_cb.texture_scale_offset.z = tex.realign_offset.x;
            self.vs_cb.texture_scale_offset.w = tex.realign_offset.y;
        } else if tex.palette.is_some() {
            // palettes are expanded to 8 bit indices on upload, with AEM already applied
            self.ps = self.ps.with_fmt(index::fmt(0, index::T8));
        }

        // modulating with 1.0 is a plain copy
        let white = [gs::ONE; 4];
        let tfx = if tex0.tfx() == gs::regs::TexFunction::Modulate && trace.constant_color(white) {
            TextureFx::Decal
        } else {
            tex0.tfx().into()
        };

        self.ps = self
            .ps
            .with_tfx(tfx)
            .with_tcc(tex0.tcc())
            .with_ltf(bilinear && shader_sampler)
            .with_rt(tex.target)
            .with_spritehack(tex.sprite_hack)
            .with_point_sampler(!bilinear || shader_sampler);

        if regs.env.prim.fst() {
            self.vs_cb.texture_scale_offset.x = 0.0625 / tw;
            self.vs_cb.texture_scale_offset.y = 0.0625 / th;
            self.ps = self.ps.with_fst(true);
        }

        self.ps_cb.wh = wh;
        self.ps_cb.half_texel = Vec4::new(-0.5, -0.5, 0.5, 0.5) / Vec4::new(wh.z, wh.w, wh.z, wh.w);
        if complex {
            self.ps_cb.msk_fix = msk_fix;
            self.ps_cb.min_max = msk_fix / Vec4::new(tw, th, tw, th);
        }

        let [tcx, tcy] = self.config.tc_offset();
        if tcx != 0.0 || tcy != 0.0 {
            self.ps = self.ps.with_tcoffsethack(true);
            self.ps_cb.tc_offset_hack = Vec4::new(tcx, tcy, tcx, tcy) / Vec4::new(tw, th, tw, th);
        }

        self.sampler = self
            .sampler
            .with_tau(wms != WrapMode::Clamp)
            .with_tav(wmt != WrapMode::Clamp)
            .with_ltf(bilinear && !shader_sampler);
    }
}
