//! Uniform setters and the per-frame state they read.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use crate::feedback::FEEDBACK_UNIT;
use crate::gl::Gl;

/// Built-in uniform: surface size in pixels, `vec2`.
pub const RESOLUTION: &str = "R";
/// Built-in uniform: seconds since the driver started, `float`.
pub const TIME: &str = "T";
/// Built-in uniform: frames drawn since the last resize, `int`.
pub const FRAME: &str = "F";
/// Built-in uniform: smaller of width and height at the last resize, `float`.
pub const MIN_DIMENSION: &str = "D";

/// Counters shared by every pass, advanced by the driver once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderState {
    pub width: u32,
    pub height: u32,
    pub time: f32,
    pub frame: u32,
    pub min_dimension: f32,
}

pub type UniformSetter<G> =
    Box<dyn Fn(&G, &<G as Gl>::UniformLocation, &FrameContext<'_, G>)>;

/// Read-only view a setter gets while its pass is drawn.
pub struct FrameContext<'a, G: Gl> {
    state: &'a RenderState,
    outputs: &'a HashMap<String, G::Texture>,
    next_unit: Cell<u32>,
}

impl<'a, G: Gl> FrameContext<'a, G> {
    pub(crate) fn new(state: &'a RenderState, outputs: &'a HashMap<String, G::Texture>) -> Self {
        Self {
            state,
            outputs,
            next_unit: Cell::new(FEEDBACK_UNIT + 1),
        }
    }

    pub fn state(&self) -> &RenderState {
        self.state
    }

    /// Latest output of buffered pass `pass_id` at this point of the frame.
    pub fn output(&self, pass_id: &str) -> Option<G::Texture> {
        self.outputs.get(pass_id).copied()
    }

    /// Binds the latest output of `pass_id` to a free texture unit and points
    /// the sampler at `location` to it. Returns false for unknown or direct passes.
    pub fn bind_output(&self, gl: &G, location: &G::UniformLocation, pass_id: &str) -> bool {
        let Some(texture) = self.output(pass_id) else {
            return false;
        };
        let unit = self.next_unit.get();
        gl.active_texture(unit);
        gl.bind_texture(Some(texture));
        gl.active_texture(FEEDBACK_UNIT);
        gl.uniform_1i(location, unit as i32);
        self.next_unit.set(unit + 1);
        true
    }

    pub(crate) fn release_units(&self, gl: &G) {
        let first = FEEDBACK_UNIT + 1;
        for unit in first..self.next_unit.get() {
            gl.active_texture(unit);
            gl.bind_texture(None);
        }
        gl.active_texture(FEEDBACK_UNIT);
        self.next_unit.set(first);
    }
}

/// A constant uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
}

impl UniformValue {
    pub fn upload<G: Gl>(&self, gl: &G, location: &G::UniformLocation) {
        match *self {
            UniformValue::Float(x) => gl.uniform_1f(location, x),
            UniformValue::Vec2([x, y]) => gl.uniform_2f(location, x, y),
            UniformValue::Vec3([x, y, z]) => gl.uniform_3f(location, x, y, z),
            UniformValue::Vec4([x, y, z, w]) => gl.uniform_4f(location, x, y, z, w),
            UniformValue::Int(x) => gl.uniform_1i(location, x),
        }
    }
}

/// Uniform name → setter, in name order.
pub struct UniformTable<G: Gl> {
    setters: BTreeMap<String, UniformSetter<G>>,
}

impl<G: Gl> Default for UniformTable<G> {
    fn default() -> Self {
        Self {
            setters: BTreeMap::new(),
        }
    }
}

impl<G: Gl> UniformTable<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `R`, `T`, `F` and `D` fed from [`RenderState`].
    pub fn builtins() -> Self {
        let mut table = Self::new();
        table.insert(RESOLUTION, |gl, location, frame| {
            let state = frame.state();
            gl.uniform_2f(location, state.width as f32, state.height as f32);
        });
        table.insert(TIME, |gl, location, frame| {
            gl.uniform_1f(location, frame.state().time);
        });
        table.insert(FRAME, |gl, location, frame| {
            gl.uniform_1i(location, frame.state().frame as i32);
        });
        table.insert(MIN_DIMENSION, |gl, location, frame| {
            gl.uniform_1f(location, frame.state().min_dimension);
        });
        table
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, setter: F) -> &mut Self
    where
        F: Fn(&G, &G::UniformLocation, &FrameContext<'_, G>) + 'static,
    {
        self.setters.insert(name.into(), Box::new(setter));
        self
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: UniformValue) -> &mut Self {
        self.insert(name, move |gl, location, _| value.upload(gl, location))
    }

    /// Feeds sampler `name` with the latest output of buffered pass `pass_id`.
    pub fn bind_output(&mut self, name: impl Into<String>, pass_id: impl Into<String>) -> &mut Self {
        let pass_id = pass_id.into();
        self.insert(name, move |gl, location, frame| {
            frame.bind_output(gl, location, &pass_id);
        })
    }

    /// Adds every entry of `other`, replacing entries with the same name.
    pub fn merge(&mut self, other: UniformTable<G>) {
        self.setters.extend(other.setters);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.setters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (String, UniformSetter<G>)> {
        self.setters.into_iter()
    }
}
