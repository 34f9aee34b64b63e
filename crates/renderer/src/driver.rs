use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::context::{Context, VERTEX_ATTRIBUTE};
use crate::error::{Error, Result};
use crate::gl::Gl;
use crate::pass::Pass;
use crate::surface::Surface;
use crate::uniforms::{FrameContext, RenderState, UniformTable};

/// Fragment shader text for one pass, identified by a unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSource {
    pub id: String,
    pub fragment: String,
}

impl PassSource {
    pub fn new(id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fragment: fragment.into(),
        }
    }
}

/// Requests that the driver stop at the start of its next iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one [`Driver::iterate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stopped,
}

/// Runs the pass list once per display refresh.
///
/// Every pass but the last renders into its own feedback buffer; the last
/// one renders to the surface.
pub struct Driver<G: Gl, S: Surface> {
    passes: Vec<Pass<G>>,
    context: Context<G>,
    surface: S,
    state: RenderState,
    outputs: HashMap<String, G::Texture>,
    started: Instant,
    sized: bool,
    stop: StopHandle,
}

impl<G: Gl, S: Surface> Driver<G, S> {
    /// Compiles every source before building any pass, so a broken shader
    /// anywhere in the list fails setup before a single draw.
    pub fn new(
        mut context: Context<G>,
        surface: S,
        sources: Vec<PassSource>,
        mut uniforms: HashMap<String, UniformTable<G>>,
    ) -> Result<Self> {
        validate(&sources, &uniforms)?;
        let passes = build_passes(&mut context, &sources, &mut uniforms)?;

        info!(
            passes = passes.len(),
            capability = ?context.capability(),
            "render driver ready"
        );
        Ok(Self {
            passes,
            context,
            surface,
            state: RenderState::default(),
            outputs: HashMap::new(),
            started: Instant::now(),
            sized: false,
            stop: StopHandle::new(),
        })
    }

    /// Replaces the driver's stop flag with one shared with the host.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn passes(&self) -> &[Pass<G>] {
        &self.passes
    }

    pub fn context(&self) -> &Context<G> {
        &self.context
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Renders one frame for time `now`.
    pub fn iterate(&mut self, now: Instant) -> Result<Flow> {
        if self.stop.is_stopped() {
            return Ok(Flow::Stopped);
        }

        self.state.time = now.saturating_duration_since(self.started).as_secs_f32();

        let (width, height) = self.surface.presented_size();
        if width == 0 || height == 0 {
            trace!(width, height, "surface has no area; skipping frame");
            return Ok(Flow::Continue);
        }
        if !self.sized || self.surface.backing_size() != (width, height) {
            self.resize(width, height)?;
        }

        for pass in &self.passes {
            if let Some(read) = pass.feedback().and_then(|feedback| feedback.read()) {
                publish(&mut self.outputs, pass.id(), read);
            }
        }
        for pass in &self.passes {
            let frame = FrameContext::new(&self.state, &self.outputs);
            pass.draw(self.context.gl(), &frame, |attribute| {
                self.context.draw_quad(attribute)
            })?;
            if let Some(written) = pass.feedback().and_then(|feedback| feedback.write()) {
                publish(&mut self.outputs, pass.id(), written);
            }
        }

        self.state.frame = self.state.frame.wrapping_add(1);
        for pass in &mut self.passes {
            pass.after_frame();
        }

        self.surface.present()?;
        Ok(Flow::Continue)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.surface.resize_backing(width, height);
        self.context.update_viewport(width, height);
        self.state.width = width;
        self.state.height = height;
        self.state.min_dimension = width.min(height) as f32;
        self.state.frame = 0;
        for pass in &mut self.passes {
            pass.initialize(self.context.gl(), width, height)?;
        }
        self.sized = true;
        debug!(width, height, "surface resized");
        Ok(())
    }
}

impl<G: Gl, S: Surface> Drop for Driver<G, S> {
    fn drop(&mut self) {
        for pass in &mut self.passes {
            pass.release(self.context.gl());
        }
    }
}

fn validate<T>(sources: &[PassSource], uniforms: &HashMap<String, T>) -> Result<()> {
    if sources.is_empty() {
        return Err(Error::InvalidPasses("no passes supplied".to_string()));
    }
    let mut seen = HashSet::new();
    for (index, source) in sources.iter().enumerate() {
        if source.id.is_empty() {
            return Err(Error::InvalidPasses(format!("pass {index} has an empty id")));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(Error::InvalidPasses(format!(
                "duplicate pass id `{}`",
                source.id
            )));
        }
    }
    let mut unknown: Vec<_> = uniforms
        .keys()
        .filter(|id| !seen.contains(id.as_str()))
        .collect();
    unknown.sort();
    if let Some(id) = unknown.first() {
        return Err(Error::InvalidPasses(format!(
            "uniforms supplied for unknown pass `{id}`"
        )));
    }
    Ok(())
}

/// Compiles every source, then builds the passes in order with the last one
/// direct. Passes built before a failure are released again.
fn build_passes<G: Gl>(
    context: &mut Context<G>,
    sources: &[PassSource],
    uniforms: &mut HashMap<String, UniformTable<G>>,
) -> Result<Vec<Pass<G>>> {
    let programs = sources
        .iter()
        .map(|source| {
            let vertex = context.vertex_source_for(&source.fragment);
            context.compile_and_link(vertex, &source.fragment, &source.id)
        })
        .collect::<Result<Vec<_>>>()?;

    let last = sources.len() - 1;
    let mut passes: Vec<Pass<G>> = Vec::with_capacity(sources.len());
    for (index, (source, program)) in sources.iter().zip(programs).enumerate() {
        let table = uniforms.remove(&source.id).unwrap_or_default();
        match context.build_pass(&source.id, program, VERTEX_ATTRIBUTE, table, index != last) {
            Ok(pass) => passes.push(pass),
            Err(err) => {
                for mut built in passes {
                    built.release(context.gl());
                }
                return Err(err);
            }
        }
    }
    Ok(passes)
}

fn publish<T>(outputs: &mut HashMap<String, T>, id: &str, texture: T) {
    match outputs.get_mut(id) {
        Some(slot) => *slot = texture,
        None => {
            outputs.insert(id.to_string(), texture);
        }
    }
}
