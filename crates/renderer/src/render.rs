//! Execution of draw plans.
use easyerr::ResultExt;
use glam::IVec4;
use gs::{RectVertex, Vertex};
use tracing::{error, warn};
use zerocopy::IntoBytes;

use crate::cache::{Cache, ConvertShader, ShaderSource};
use crate::config::Config;
use crate::context::DeviceContext;
use crate::date::DateStrategy;
use crate::device::{Caps, Device, SLOT_PALETTE, SLOT_RT_COPY, SLOT_TEXTURE, Stage};
use crate::error::{CompileError, DrawCtx, DrawError};
use crate::plan::{self, DrawPlan, DrawRequest};
use crate::selector::SamplerSelector;
use crate::state::Topology;

struct ResolvedPass<D: Device> {
    ps: D::Shader,
    blend: D::State,
    depth_stencil: D::State,
}

/// Everything a plan needs from the caches.
struct Resolved<D: Device> {
    vs: D::Shader,
    gs: Option<D::Shader>,
    passes: Vec<ResolvedPass<D>>,
    sampler: Option<D::State>,
    point: D::State,
}

/// Shaders and states of the DATE stencil setup draw.
struct DateSetup<D: Device> {
    vs: D::Shader,
    ps: D::Shader,
    depth_stencil: D::State,
    blend: D::State,
    sampler: D::State,
}

/// Textures borrowed for a single batch.
struct Scratch<D: Device> {
    /// Copy of the target for shader DATE.
    rt_copy: Option<D::Texture>,
    /// Resolved target sampled by the stencil setup.
    resolved: Option<D::Texture>,
}

impl<D: Device> Scratch<D> {
    fn release(self, device: &mut D) {
        for texture in [self.rt_copy, self.resolved].into_iter().flatten() {
            device.recycle(texture);
        }
    }
}

/// The hardware renderer core.
pub struct Renderer<D: Device, S> {
    context: DeviceContext<D>,
    cache: Cache<D>,
    source: S,
    config: Config,
    /// The stencil setup shaders failed to compile: stencil DATE is off for good.
    stencil_date_disabled: bool,
    skipped: u64,
}

impl<D: Device, S: ShaderSource> Renderer<D, S> {
    pub fn new(device: D, source: S, config: Config) -> Self {
        Self {
            context: DeviceContext::new(device),
            cache: Cache::new(config.max_anisotropy, config.paltex),
            source,
            config,
            stencil_date_disabled: false,
            skipped: 0,
        }
    }

    pub fn device(&self) -> &D {
        self.context.device()
    }

    pub fn context_mut(&mut self) -> &mut DeviceContext<D> {
        &mut self.context
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Cache<D> {
        &self.cache
    }

    /// Number of batches dropped because of a recoverable error.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn caps(&self) -> Caps {
        let mut caps = self.context.device().caps();
        caps.stencil &= !self.stencil_date_disabled;
        caps
    }

    /// Draws a batch, logging and dropping it on failure.
    pub fn submit(&mut self, req: &DrawRequest<'_, D::Texture>) {
        if let Err(e) = self.draw(req) {
            warn!("skipping batch: {e}");
            self.skipped += 1;
        }
    }

    pub fn draw(&mut self, req: &DrawRequest<'_, D::Texture>) -> Result<(), DrawError> {
        let mut plan = plan::plan(req, self.caps(), &self.config)?;
        if req.indices.is_empty() {
            return Ok(());
        }

        let date_setup = if plan.date.uses_stencil() {
            match self.resolve_date_setup(plan.datm) {
                Ok(setup) => Some(setup),
                Err(e) => {
                    error!("stencil DATE setup failed to compile, using target copies: {e}");
                    self.stencil_date_disabled = true;
                    plan = plan::plan(req, self.caps(), &self.config)?;
                    None
                }
            }
        } else {
            None
        };

        let mut resolved = self.resolve(&plan)?;
        let date = plan.date;
        let scratch = self.acquire_scratch(&mut plan, req);
        if plan.date != date {
            // DATE was given up, the passes changed with it
            resolved = match self.resolve(&plan) {
                Ok(resolved) => resolved,
                Err(e) => {
                    scratch.release(self.context.device_mut());
                    return Err(e);
                }
            };
        }

        self.execute(&plan, req, &resolved, date_setup.as_ref(), &scratch);
        scratch.release(self.context.device_mut());

        Ok(())
    }

    fn resolve_date_setup(&mut self, datm: bool) -> Result<DateSetup<D>, CompileError> {
        let device = self.context.device_mut();
        let vs = self
            .cache
            .shader(device, &self.source, ConvertShader::Vertex)?
            .clone();
        let ps = self
            .cache
            .shader(device, &self.source, ConvertShader::datm(datm))?
            .clone();

        let states = self.cache.date_states(device);
        let depth_stencil = states.depth_stencil.clone();
        let blend = states.blend.clone();
        let sampler = self
            .cache
            .sampler_state(device, SamplerSelector::default())
            .clone();

        Ok(DateSetup {
            vs,
            ps,
            depth_stencil,
            blend,
            sampler,
        })
    }

    /// Borrows the scratch textures the DATE strategy needs, giving up on DATE without them.
    fn acquire_scratch(
        &mut self,
        plan: &mut DrawPlan,
        req: &DrawRequest<'_, D::Texture>,
    ) -> Scratch<D> {
        let mut scratch = Scratch {
            rt_copy: None,
            resolved: None,
        };

        let Some(rt) = &req.rt else {
            return scratch;
        };

        let device = self.context.device_mut();
        match plan.date {
            DateStrategy::Copy => {
                scratch.rt_copy = device.create_render_target(rt.texture);
                if scratch.rt_copy.is_none() {
                    warn!("no scratch target for DATE, drawing without it");
                    plan.disable_date();
                }
            }
            DateStrategy::OnePixel | DateStrategy::Stencil
                if device.is_multisampled(rt.texture) =>
            {
                scratch.resolved = device.resolve(rt.texture);
                if scratch.resolved.is_none() {
                    warn!("failed to resolve the target for DATE, drawing without it");
                    plan.disable_date();
                }
            }
            _ => (),
        }

        scratch
    }

    /// Looks up or compiles every shader and state of the plan.
    fn resolve(&mut self, plan: &DrawPlan) -> Result<Resolved<D>, DrawError> {
        let device = self.context.device_mut();
        let source = &self.source;
        let cache = &mut self.cache;

        let vs = cache
            .shader(device, source, plan.vs)
            .context(DrawCtx::ShaderCompilation)?
            .clone();
        let gs = match plan.gs {
            Some(key) => Some(
                cache
                    .shader(device, source, key)
                    .context(DrawCtx::ShaderCompilation)?
                    .clone(),
            ),
            None => None,
        };

        let mut passes = Vec::with_capacity(plan.passes.len());
        for pass in plan.passes.iter() {
            let ps = cache
                .shader(device, source, pass.ps)
                .context(DrawCtx::ShaderCompilation)?
                .clone();

            passes.push(ResolvedPass {
                ps,
                blend: cache.blend_state(device, pass.blend).clone(),
                depth_stencil: cache.depth_stencil_state(device, pass.depth).clone(),
            });
        }

        let sampler = plan.sampler.map(|key| cache.sampler_state(device, key).clone());
        let point = cache.sampler_state(device, SamplerSelector::default()).clone();

        Ok(Resolved {
            vs,
            gs,
            passes,
            sampler,
            point,
        })
    }

    /// Tags the pixels passing the destination alpha test with stencil 1.
    fn setup_date(
        &mut self,
        plan: &DrawPlan,
        rt: &D::Texture,
        ds: &D::Texture,
        sampled: &D::Texture,
        setup: &DateSetup<D>,
    ) {
        let ctx = &mut self.context;
        ctx.begin_scene();
        ctx.device_mut().clear_stencil(ds, 0);

        ctx.set_depth_stencil_state(&setup.depth_stencil, 1);
        ctx.set_blend_state(&setup.blend, 0.0);
        // the tagging draw must not sample the targets it is bound to
        ctx.unbind_resource(rt);
        ctx.unbind_resource(ds);
        let bound = ctx.set_render_targets(None, Some(ds), plan.target_size, None);
        debug_assert!(bound.is_ok(), "a depth-stencil target is always given");

        ctx.set_vertices(plan.date_rect.as_bytes(), size_of::<RectVertex>());
        ctx.set_topology(Topology::TriangleStrip);

        ctx.set_shader(Stage::Vertex, Some(&setup.vs));
        ctx.set_shader(Stage::Geometry, None);
        ctx.set_shader(Stage::Pixel, Some(&setup.ps));
        ctx.set_resource(SLOT_TEXTURE, Some(sampled));
        ctx.set_resource(SLOT_PALETTE, None);
        ctx.set_resource(SLOT_RT_COPY, None);
        ctx.set_sampler(SLOT_TEXTURE, Some(&setup.sampler));
        ctx.set_sampler(SLOT_PALETTE, None);
        ctx.set_sampler(SLOT_RT_COPY, None);

        ctx.draw(plan.date_rect.len() as u32);
        ctx.end_scene();
    }

    fn execute(
        &mut self,
        plan: &DrawPlan,
        req: &DrawRequest<'_, D::Texture>,
        resolved: &Resolved<D>,
        date_setup: Option<&DateSetup<D>>,
        scratch: &Scratch<D>,
    ) {
        let rt = req.rt.as_ref().map(|t| t.texture);
        let ds = req.ds.as_ref().map(|t| t.texture);

        let stencil = plan.date.uses_stencil();
        if let (true, Some(setup), Some(rt), Some(ds)) = (stencil, date_setup, rt, ds) {
            let sampled = scratch.resolved.as_ref().unwrap_or(rt);
            self.setup_date(plan, rt, ds, sampled, setup);
        }

        if let (Some(rt), Some(copy)) = (rt, &scratch.rt_copy) {
            let size = plan.target_size;
            self.context
                .device_mut()
                .copy_rect(rt, copy, IVec4::new(0, 0, size.x as i32, size.y as i32));
        }

        let ctx = &mut self.context;
        ctx.begin_scene();

        if let Some(rt) = rt {
            ctx.unbind_resource(rt);
        }
        if let Some(ds) = ds {
            ctx.unbind_resource(ds);
        }

        let bound = ctx.set_render_targets(rt, ds, plan.target_size, Some(plan.scissor));
        debug_assert!(bound.is_ok(), "planning requires a target");

        ctx.set_vertices(req.vertices.as_bytes(), size_of::<Vertex>());
        ctx.set_indices(req.indices);
        ctx.set_topology(plan.topology);

        ctx.set_shader(Stage::Vertex, Some(&resolved.vs));
        ctx.set_constants(Stage::Vertex, plan.vs_cb.as_bytes());
        ctx.set_shader(Stage::Geometry, resolved.gs.as_ref());
        if resolved.gs.is_some() {
            ctx.set_constants(Stage::Geometry, plan.gs_cb.as_bytes());
        }

        let tex = req.tex.as_ref();
        let palette = tex.and_then(|t| t.palette);
        ctx.set_resource(SLOT_TEXTURE, tex.map(|t| t.texture));
        ctx.set_resource(SLOT_PALETTE, palette);
        ctx.set_resource(SLOT_RT_COPY, scratch.rt_copy.as_ref());
        ctx.set_sampler(SLOT_TEXTURE, resolved.sampler.as_ref());
        ctx.set_sampler(SLOT_PALETTE, palette.map(|_| &resolved.point));
        ctx.set_sampler(SLOT_RT_COPY, scratch.rt_copy.as_ref().map(|_| &resolved.point));

        let factor = plan.blend_factor();
        for (pass, objects) in plan.passes.iter().zip(&resolved.passes) {
            ctx.set_depth_stencil_state(&objects.depth_stencil, pass.depth.stencil_ref());
            ctx.set_blend_state(&objects.blend, factor);
            ctx.set_shader(Stage::Pixel, Some(&objects.ps));
            ctx.set_constants(Stage::Pixel, pass.ps_cb.as_bytes());
            ctx.draw_indexed(req.indices.len() as u32);
        }

        ctx.end_scene();

        if let (true, Some(rt)) = (plan.fba_fixup, rt) {
            ctx.device_mut().update_fba(rt);
        }
    }
}
