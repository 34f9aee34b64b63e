//! Desktop host: a winit window with a glutin-created OpenGL ES context.
//!
//! ```text
//!   run(WindowConfig) ──▶ DisplayBuilder ──▶ GLES 3.0 context (or GLES 2.0)
//!          │                                         │
//!          ▼                                         ▼
//!   winit event loop ── RedrawRequested ──▶ Driver::iterate ──▶ swap_buffers
//! ```

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{anyhow, Context as _, Result};
use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributes, ContextAttributesBuilder, NotCurrentContext,
    NotCurrentGlContext, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface as GlutinSurface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::context::Context;
use crate::driver::{Driver, Flow, PassSource, StopHandle};
use crate::error::Error;
use crate::gl::Gl;
use crate::surface::Surface;
use crate::uniforms::UniformTable;

/// The GL binding used on desktop.
pub type NativeGl = glow::Context;

/// Which context versions the window may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TierPreference {
    /// GLES 3.0 first, GLES 2.0 when that fails.
    #[default]
    Auto,
    /// GLES 2.0 only.
    Baseline,
}

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub size: (u32, u32),
    pub vsync: bool,
    pub tier: TierPreference,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "backdrop".to_string(),
            size: (1280, 720),
            vsync: true,
            tier: TierPreference::Auto,
        }
    }
}

struct NativeSurface {
    // Declared before the context so the surface is destroyed first.
    gl_surface: GlutinSurface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
    window: Window,
    backing: (u32, u32),
}

impl Surface for NativeSurface {
    fn presented_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        if let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            self.gl_surface.resize(&self.gl_context, w, h);
        }
        self.backing = (width, height);
    }

    fn present(&mut self) -> crate::Result<()> {
        self.gl_surface
            .swap_buffers(&self.gl_context)
            .map_err(|err| Error::Gpu(format!("swap_buffers failed: {err}")))
    }
}

/// Opens a window and renders `sources` into it until the window closes or
/// `stop` is requested. Engine failures come back as [`Error`] inside the
/// returned `anyhow::Error`.
pub fn run(
    config: WindowConfig,
    sources: Vec<PassSource>,
    uniforms: HashMap<String, UniformTable<NativeGl>>,
    stop: StopHandle,
) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_builder = WindowBuilder::new()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.size.0, config.size.1));
    let template = ConfigTemplateBuilder::new().with_alpha_size(8);
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder))
        .build(&event_loop, template, pick_config)
        .map_err(|err| Error::NoContext(format!("no matching GL config: {err}")))?;
    let window = window.ok_or_else(|| anyhow!("display builder did not create a window"))?;

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();
    let not_current = create_context(&gl_display, &gl_config, raw_window_handle, config.tier)?;

    let attributes = window.build_surface_attributes(Default::default());
    let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attributes) }
        .context("failed to create GL window surface")?;
    let gl_context = not_current
        .make_current(&gl_surface)
        .context("failed to make GL context current")?;

    if config.vsync {
        if let Err(err) =
            gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
        {
            warn!(error = %err, "failed to enable vsync");
        }
    }

    let gl = unsafe {
        glow::Context::from_loader_function(|symbol| match CString::new(symbol) {
            Ok(symbol) => gl_display.get_proc_address(&symbol),
            Err(_) => std::ptr::null(),
        })
    };
    let version = Gl::version(&gl);
    info!(
        major = version.major,
        minor = version.minor,
        embedded = version.embedded,
        "GL context ready"
    );

    let size = window.inner_size();
    let surface = NativeSurface {
        gl_surface,
        gl_context,
        window,
        backing: (size.width, size.height),
    };
    let context = Context::new(gl)?;
    let mut driver = Driver::new(context, surface, sources, uniforms)?.with_stop_handle(stop.clone());

    let failure: Rc<Cell<Option<Error>>> = Rc::new(Cell::new(None));
    let loop_failure = Rc::clone(&failure);
    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            match event {
                Event::WindowEvent { window_id, event }
                    if window_id == driver.surface().window.id() =>
                {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            debug!("window closed");
                            stop.stop();
                            elwt.exit();
                        }
                        WindowEvent::RedrawRequested => match driver.iterate(Instant::now()) {
                            Ok(Flow::Continue) => {}
                            Ok(Flow::Stopped) => {
                                debug!("stop requested; leaving event loop");
                                elwt.exit();
                            }
                            Err(err) => {
                                error!(error = %err, "frame failed");
                                loop_failure.set(Some(err));
                                elwt.exit();
                            }
                        },
                        _ => {}
                    }
                }
                Event::AboutToWait => driver.surface().window.request_redraw(),
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    match failure.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .min_by_key(|config| config.num_samples())
        .expect("glutin offers at least one config")
}

fn create_context(
    display: &Display,
    config: &Config,
    raw_window_handle: RawWindowHandle,
    tier: TierPreference,
) -> Result<NotCurrentContext, Error> {
    let attributes = |major, minor| -> ContextAttributes {
        ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(major, minor))))
            .build(Some(raw_window_handle))
    };
    let attempts: &[(u8, u8)] = match tier {
        TierPreference::Auto => &[(3, 0), (2, 0)],
        TierPreference::Baseline => &[(2, 0)],
    };

    let mut failures = Vec::new();
    for &(major, minor) in attempts {
        match unsafe { display.create_context(config, &attributes(major, minor)) } {
            Ok(context) => {
                debug!(major, minor, "created GLES context");
                return Ok(context);
            }
            Err(err) => {
                debug!(major, minor, error = %err, "GLES context unavailable");
                failures.push(format!("GLES {major}.{minor}: {err}"));
            }
        }
    }
    Err(Error::NoContext(failures.join("; ")))
}
