//! The blur effect: per-frame bookkeeping and the render pipeline behind each window.
//!
//! For every output the host calls [`BlurEffect::pre_paint_screen`], then
//! [`BlurEffect::pre_paint_window`] for each window bottom to top. While rendering, it calls
//! [`BlurEffect::prepare_window`] with the renderer and [`BlurEffect::draw_window`] with the frame,
//! right before drawing the window itself.

use std::collections::{HashMap, HashSet};

use anyhow::{ensure, Context as _};
use blur_effect_config::Settings;
use smithay::backend::allocator::Fourcc;
use smithay::backend::renderer::gles::{ffi, GlesFrame, GlesRenderer, GlesTexture};
use smithay::backend::renderer::{
    ContextId, Frame as _, Offscreen as _, Renderer as _, Texture as _,
};
use smithay::utils::{Physical, Rectangle};

use crate::animation::Clock;
use crate::host::{
    HostWindow, OutputId, PaintMask, RenderViewport, WindowId, WindowPaintData, WindowPrePaintData,
    WindowType,
};
use crate::render_helpers::background_effect::{Parameters, Shape};
use crate::render_helpers::blur::{capture, BlurProgram};
use crate::render_helpers::contrast::{color_matrix, ContrastPass};
use crate::render_helpers::noise::NoisePass;
use crate::render_helpers::refraction::RefractionPass;
use crate::render_helpers::rounded_corners::RoundedCornersPass;
use crate::render_helpers::shaders::{bind_texture, projection, rect_vertices};
use crate::render_helpers::strength::{BlurStrength, StrengthTable};
use crate::utils::Region;
use crate::window::WindowManager;

pub mod data;
pub mod geometry;
pub mod paint;

pub use data::BlurEffectData;
use geometry::blur_geometry;
use paint::PaintTracker;

/// Everything [`BlurEffect::draw_window`] needs, computed by [`BlurEffect::prepare_window`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    output: OutputId,
    params: Parameters,
    shape: Shape,
    /// Framebuffer rects to copy into the first blur texture.
    capture: Vec<Rectangle<i32, Physical>>,
    /// Framebuffer rects to draw the blur over.
    visible: Vec<Rectangle<i32, Physical>>,
    noise: bool,
}

#[derive(Debug)]
struct Programs {
    blur: Option<BlurProgram>,
    contrast: ContrastPass,
    refraction: RefractionPass,
    rounded_corners: RoundedCornersPass,
    noise: NoisePass,
    /// Renderer the programs were compiled for.
    renderer_context_id: Option<ContextId<GlesTexture>>,
    /// The blur or the contrast program did not compile.
    failed: bool,
}

impl Programs {
    fn compile(&mut self, renderer: &mut GlesRenderer) {
        let _span = tracy_client::span!("Programs::compile");

        self.blur = match BlurProgram::compile(renderer) {
            Ok(program) => Some(program),
            Err(err) => {
                warn!("{err:?}");
                None
            }
        };
        self.contrast.compile(renderer);
        self.refraction.compile(renderer);
        self.rounded_corners.compile(renderer);
        self.noise.compile(renderer);

        self.failed = self.blur.is_none() || !self.contrast.ready();
        if self.failed {
            warn!("blur shaders are unavailable, disabling blur");
        }
    }

    fn destroy(&mut self, renderer: &mut GlesRenderer) {
        let mut res = Ok(());
        if let Some(blur) = self.blur.take() {
            res = res.and(blur.destroy(renderer));
        }
        res = res.and(self.contrast.destroy(renderer));
        res = res.and(self.refraction.destroy(renderer));
        res = res.and(self.rounded_corners.destroy(renderer));
        res = res.and(self.noise.destroy(renderer));

        if let Err(err) = res {
            warn!("error destroying blur programs: {err:?}");
        }
        self.renderer_context_id = None;
    }
}

#[derive(Debug)]
pub struct BlurEffect {
    settings: Settings,
    window_manager: WindowManager,
    strength_table: StrengthTable,
    strength: BlurStrength,
    windows: HashMap<WindowId, BlurEffectData<GlesTexture>>,
    /// Windows whose blur region is recomputed on their next pre-paint.
    pending: HashSet<WindowId>,
    paint: PaintTracker,
    current_output: Option<OutputId>,
    programs: Programs,
}

impl BlurEffect {
    pub fn new(settings: Settings, clock: Clock) -> Self {
        let strength_table = StrengthTable::new();
        let strength = strength_table.get(settings.general.blur_strength);

        Self {
            window_manager: WindowManager::new(&settings, clock),
            strength_table,
            strength,
            windows: HashMap::new(),
            pending: HashSet::new(),
            paint: PaintTracker::new(),
            current_output: None,
            programs: Programs {
                blur: None,
                contrast: ContrastPass::new(),
                refraction: RefractionPass::new(&settings.refraction),
                rounded_corners: RoundedCornersPass::new(),
                noise: NoisePass::new(),
                renderer_context_id: None,
                failed: false,
            },
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn window_manager(&self) -> &WindowManager {
        &self.window_manager
    }

    pub fn strength(&self) -> BlurStrength {
        self.strength
    }

    pub fn window_data(&self, id: WindowId) -> Option<&BlurEffectData<GlesTexture>> {
        self.windows.get(&id)
    }

    pub fn current_output(&self) -> Option<OutputId> {
        self.current_output
    }

    /// Whether the effect can draw anything.
    pub fn is_active(&self) -> bool {
        !self.programs.failed
    }

    /// Applies new settings. `windows` are all windows the host currently shows.
    ///
    /// Tracked windows left out of `windows` pick up the settings on their next pre-paint.
    pub fn reconfigure(&mut self, settings: Settings, windows: &[&dyn HostWindow]) {
        let _span = tracy_client::span!("BlurEffect::reconfigure");

        self.strength = self.strength_table.get(settings.general.blur_strength);
        debug!(
            "blur strength {}: {} iterations, offset {}, expand size {}",
            settings.general.blur_strength,
            self.strength.iterations,
            self.strength.offset,
            self.strength.expand_size,
        );

        self.programs.refraction.reconfigure(&settings.refraction);
        self.window_manager.reconfigure(&settings, windows);
        self.settings = settings;

        self.pending.extend(windows.iter().map(|w| w.id()));
    }

    /// Starts tracking `w`. Follow up with [`BlurEffect::on_maximized_state_changed`] when the
    /// window is already maximized.
    pub fn on_window_added(&mut self, w: &dyn HostWindow) {
        self.window_manager.on_window_added(w);
        self.pending.insert(w.id());
    }

    pub fn on_window_removed(&mut self, id: WindowId) {
        self.window_manager.on_window_removed(id);
        self.windows.remove(&id);
        self.pending.remove(&id);
    }

    /// The window or its decoration changed the region it wants blurred.
    pub fn on_window_blur_changed(&mut self, w: &dyn HostWindow) {
        self.pending.insert(w.id());
    }

    pub fn on_frame_geometry_changed(&mut self, w: &dyn HostWindow) {
        self.window_manager.on_frame_geometry_changed(w);
    }

    pub fn on_maximized_state_changed(
        &mut self,
        w: &dyn HostWindow,
        horizontal: bool,
        vertical: bool,
    ) {
        self.window_manager
            .on_maximized_state_changed(w, horizontal, vertical);
    }

    pub fn on_minimized_changed(&mut self, w: &dyn HostWindow) {
        self.window_manager.on_minimized_changed(w);
    }

    pub fn on_move_resize_started(&mut self, w: &dyn HostWindow) {
        self.window_manager.on_move_resize_started(w);
    }

    pub fn on_move_resize_finished(&mut self, w: &dyn HostWindow) {
        self.window_manager.on_move_resize_finished(w);
    }

    pub fn on_output_removed(&mut self, output: OutputId) {
        debug!("freeing blur textures of {output:?}");
        data::free_output(&mut self.windows, output);
        if self.current_output == Some(output) {
            self.current_output = None;
        }
    }

    pub fn pre_paint_screen(&mut self, output: OutputId) {
        self.paint.reset();
        self.current_output = Some(output);
        self.pending.extend(self.window_manager.take_region_updates());
    }

    /// Resolves the window's blur region and extends `data` for occlusion.
    pub fn pre_paint_window(&mut self, w: &dyn HostWindow, data: &mut WindowPrePaintData) {
        let _span = tracy_client::span!("BlurEffect::pre_paint_window");

        if self.window_manager.refresh_stale(w) {
            self.pending.insert(w.id());
        }
        if self.pending.remove(&w.id()) {
            self.update_blur_region(w);
        }

        let blur_area = match self.windows.get_mut(&w.id()) {
            Some(entry) => {
                entry.refresh_contrast(w);
                let frame = w.frame_geometry().to_i32_round::<i32>();
                let contents = w.contents_rect().to_i32_round();
                entry
                    .blur_region(contents)
                    .translated(frame.loc.x, frame.loc.y)
            }
            None => Region::new(),
        };

        self.paint
            .pre_paint_window(data, &blur_area, self.strength.expand_size);
    }

    fn update_blur_region(&mut self, w: &dyn HostWindow) {
        let mut content = w.blur_region();
        let mut frame = w.decoration_blur_region();
        self.window_manager
            .final_blur_region(w, &mut content, &mut frame);

        let id = w.id();
        if content.is_none() && frame.is_none() {
            if self.windows.remove(&id).is_some() {
                trace!("{id:?} no longer has a blur region");
            }
            return;
        }

        let entry = self.windows.entry(id).or_default();
        entry.content = content;
        entry.frame = frame;
    }

    fn should_blur(&mut self, w: &dyn HostWindow, paint: &WindowPaintData) -> bool {
        if w.window_type() == WindowType::Desktop {
            return false;
        }

        let transformed = paint.is_scaled()
            || paint.is_translated()
            || paint.mask.contains(PaintMask::TRANSFORMED);
        self.window_manager.set_window_is_transformed(w, transformed);

        !transformed || self.window_manager.window_should_blur_while_transformed(w)
    }

    /// Compiles the programs for `renderer` if needed. Returns `false` if blur is unavailable.
    fn ensure_programs(&mut self, renderer: &mut GlesRenderer) -> bool {
        let context_id = renderer.context_id();
        if self.programs.renderer_context_id.as_ref() == Some(&context_id) {
            return !self.programs.failed;
        }

        if self.programs.renderer_context_id.is_some() {
            debug!("recompiling blur programs: renderer changed");
            // Textures of the old renderer can't be used anymore.
            for data in self.windows.values_mut() {
                data.render.clear();
                data.plan = None;
            }
        }

        self.programs.compile(renderer);
        self.programs.renderer_context_id = Some(context_id);
        !self.programs.failed
    }

    /// Sets up the blur behind `w` on `viewport` for this frame.
    ///
    /// `damage` is the part of the framebuffer being repainted. Returns `true` when
    /// [`BlurEffect::draw_window`] has something to draw.
    pub fn prepare_window(
        &mut self,
        renderer: &mut GlesRenderer,
        viewport: &RenderViewport,
        w: &dyn HostWindow,
        paint: &WindowPaintData,
        damage: &[Rectangle<i32, Physical>],
    ) -> bool {
        let _span = tracy_client::span!("BlurEffect::prepare_window");

        let id = w.id();
        match self.windows.get_mut(&id) {
            Some(entry) => entry.plan = None,
            None => return false,
        }

        if !self.ensure_programs(renderer) || !self.should_blur(w, paint) {
            return false;
        }

        let opacity = self.window_manager.effective_blur_opacity(w, paint.opacity);
        if opacity <= 0. {
            return false;
        }
        let corner_radius = self
            .window_manager
            .effective_border_radius(w)
            .scaled_by(viewport.scale as f32);

        let strength = self.strength;
        let Some(entry) = self.windows.get_mut(&id) else {
            return false;
        };

        let region = entry.blur_region(w.contents_rect().to_i32_round());
        let Some(geometry) = blur_geometry(
            viewport,
            w.frame_geometry(),
            &region,
            paint,
            strength.expand_size,
            damage,
        ) else {
            return false;
        };

        let render = entry.render.entry(viewport.output).or_default();
        let res = render.prepare(geometry.background.size, strength.iterations, |size| {
            renderer
                .create_buffer(Fourcc::Abgr8888, size)
                .context("error creating texture")
        });
        let reallocated = match res {
            Ok(reallocated) => reallocated,
            Err(err) => {
                warn!("error preparing blur textures: {err:?}");
                entry.render.remove(&viewport.output);
                return false;
            }
        };

        let Some(level_1) = render.textures().get(1) else {
            return false;
        };
        let level_1 = level_1.size();

        let general = &self.settings.general;
        let force = general.force_contrast_params;
        let matrix = color_matrix(
            contrast_param(force, entry.contrast.brightness, general.brightness) as f32,
            contrast_param(force, entry.contrast.saturation, general.saturation) as f32,
            contrast_param(force, entry.contrast.contrast, general.contrast) as f32,
        );

        let params = Parameters {
            projection: projection(viewport.size),
            background: geometry.background,
            color_matrix: matrix,
            half_pixel: [0.5 / level_1.w as f32, 0.5 / level_1.h as f32],
            offset: strength.offset,
            opacity: opacity as f32,
            window_box: geometry.window_box,
            corner_radius,
        };

        // Fresh textures hold garbage outside of the damage.
        let capture = if reallocated {
            vec![geometry.background]
        } else {
            let damage = Region::from_rects(damage.iter().copied());
            damage
                .intersected_rect(&geometry.background)
                .rects()
                .to_vec()
        };

        let noise_scale = viewport.scale.round().max(1.) as i32;
        let noise = match self
            .programs
            .noise
            .prepare(renderer, general.noise_strength, noise_scale)
        {
            Ok(noise) => noise,
            Err(err) => {
                warn!("error preparing noise: {err:?}");
                false
            }
        };

        entry.plan = Some(DrawPlan {
            output: viewport.output,
            params,
            shape: if params.has_radius() {
                Shape::Rounded
            } else {
                Shape::Rectangular
            },
            capture,
            visible: geometry.visible.rects().to_vec(),
            noise,
        });

        true
    }

    /// Draws the blur prepared for `w` into `frame`.
    pub fn draw_window(&mut self, frame: &mut GlesFrame<'_, '_>, w: &dyn HostWindow) {
        let _span = tracy_client::span!("BlurEffect::draw_window");

        let Some(entry) = self.windows.get_mut(&w.id()) else {
            return;
        };
        let Some(plan) = entry.plan.take() else {
            return;
        };
        let Some(render) = entry.render.get(&plan.output) else {
            return;
        };

        if let Err(err) = draw(frame, &self.programs, render.textures(), &plan) {
            warn!("error drawing blur: {err:?}");
        }
    }

    /// Releases every GL resource. The effect compiles its programs again on next use.
    pub fn destroy_gl(&mut self, renderer: &mut GlesRenderer) {
        for data in self.windows.values_mut() {
            data.render.clear();
            data.plan = None;
        }
        self.programs.destroy(renderer);
    }
}

/// Value for one color adjustment, honoring the force setting.
fn contrast_param(force: bool, requested: Option<f64>, configured: f64) -> f64 {
    if force {
        return configured;
    }
    requested.unwrap_or(configured)
}

fn draw(
    frame: &mut GlesFrame<'_, '_>,
    programs: &Programs,
    textures: &[GlesTexture],
    plan: &DrawPlan,
) -> anyhow::Result<()> {
    let blur = programs.blur.as_ref().context("blur program is missing")?;
    ensure!(
        programs.renderer_context_id.as_ref() == Some(&frame.context_id()),
        "wrong renderer"
    );
    ensure!(textures.len() >= 2, "expected at least 2 blur textures");

    let vertices = rect_vertices(&plan.visible);

    frame.with_context(|gl| unsafe {
        while gl.GetError() != ffi::NO_ERROR {}

        let mut current_fbo = 0i32;
        let mut viewport = [0i32; 4];
        gl.GetIntegerv(ffi::FRAMEBUFFER_BINDING, &mut current_fbo as *mut _);
        gl.GetIntegerv(ffi::VIEWPORT, viewport.as_mut_ptr());

        let mut fbo = 0;
        gl.GenFramebuffers(1, &mut fbo as *mut _);
        gl.BindFramebuffer(ffi::DRAW_FRAMEBUFFER, fbo);

        let res = capture(gl, &textures[0], plan.params.background, &plan.capture);
        if res.is_ok() {
            blur.render(gl, textures, plan.params.offset);
        }

        gl.BindFramebuffer(ffi::FRAMEBUFFER, current_fbo as u32);
        gl.DeleteFramebuffers(1, &fbo as *const _);
        gl.Viewport(viewport[0], viewport[1], viewport[2], viewport[3]);

        if res.is_ok() {
            composite(gl, programs, textures, plan, &vertices);
        }

        // Restore state set by GlesFrame that we just modified.
        gl.UseProgram(0);
        gl.Enable(ffi::BLEND);
        gl.BlendFunc(ffi::ONE, ffi::ONE_MINUS_SRC_ALPHA);
        gl.Enable(ffi::SCISSOR_TEST);

        res
    })??;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompositePass {
    Refraction,
    Contrast,
}

/// Program picked to draw the blurred texture onto the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CompositeChoice {
    pass: CompositePass,
    shape: Shape,
    /// The rounded shape was wanted but only a rectangular program is available.
    mask_corners: bool,
}

/// Picks the composite program for a `wanted` shape.
///
/// Refraction wins when it has a program for the shape. Otherwise contrast is used, falling back
/// to its rectangular variant. Returns `None` when no program is available.
fn choose_composite(
    wanted: Shape,
    has_refraction: impl Fn(Shape) -> bool,
    has_contrast: impl Fn(Shape) -> bool,
) -> Option<CompositeChoice> {
    let (pass, shape) = if has_refraction(wanted) {
        (CompositePass::Refraction, wanted)
    } else if has_contrast(wanted) {
        (CompositePass::Contrast, wanted)
    } else if has_contrast(Shape::Rectangular) {
        (CompositePass::Contrast, Shape::Rectangular)
    } else {
        return None;
    };

    Some(CompositeChoice {
        pass,
        shape,
        mask_corners: wanted == Shape::Rounded && shape == Shape::Rectangular,
    })
}

unsafe fn composite(
    gl: &ffi::Gles2,
    programs: &Programs,
    textures: &[GlesTexture],
    plan: &DrawPlan,
    vertices: &[f32],
) {
    let params = &plan.params;
    let refraction = &programs.refraction;
    let contrast = &programs.contrast;

    let Some(choice) = choose_composite(
        plan.shape,
        |shape| refraction.has_program(shape),
        |shape| contrast.program(shape).is_some(),
    ) else {
        return;
    };

    gl.Disable(ffi::SCISSOR_TEST);
    gl.Enable(ffi::BLEND);
    gl.BlendFunc(ffi::ONE, ffi::ONE_MINUS_SRC_ALPHA);
    bind_texture(gl, textures[1].tex_id(), ffi::LINEAR, ffi::CLAMP_TO_EDGE);

    let shape = choice.shape;
    match choice.pass {
        CompositePass::Refraction => {
            refraction.push_shader(gl, shape);
            refraction.set_parameters(gl, shape, params);
            refraction.draw(gl, shape, vertices);
        }
        CompositePass::Contrast => {
            contrast.push_shader(gl, shape);
            contrast.set_parameters(gl, shape, params);
            contrast.draw(gl, shape, vertices);
        }
    }

    if choice.mask_corners {
        programs
            .rounded_corners
            .apply(gl, params, &textures[0], vertices);
    }

    if plan.noise {
        programs.noise.apply(gl, plan.shape, params, vertices);
    }
}
