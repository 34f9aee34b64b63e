//! Software [`Gl`] used by the unit tests.
//!
//! Shaders cannot be executed here, so fragment sources are registered up
//! front together with a Rust closure standing in for the compiled program.
//! Unregistered fragment sources fail to compile. Declared uniforms and
//! attributes are scraped from the GLSL text so location lookups behave like
//! a real driver: names the source never declares resolve to `None`.
//!
//! The viewport doubles as the size of the default framebuffer. Texture
//! storage allocated without data reads as NaN until it is cleared or drawn.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::Result;
use crate::gl::{ContextVersion, Gl, ShaderStage, TextureStorage};
use crate::surface::Surface;

pub(crate) type Pixel = [f32; 4];
type FragmentFn = Rc<dyn Fn(&Fragment<'_>) -> Pixel>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Floats(Vec<f32>),
    Int(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Viewport(i32, i32),
    TexImage {
        texture: u32,
        width: i32,
        height: i32,
        storage: TextureStorage,
    },
    Uniform {
        program: u32,
        name: String,
        value: Value,
    },
    Draw {
        program: u32,
        target: Option<u32>,
    },
    BindFramebuffer(Option<u32>),
    Clear {
        target: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SoftLocation {
    program: u32,
    name: String,
}

struct ShaderObject {
    stage: ShaderStage,
    source: Option<String>,
    compiled: bool,
}

#[derive(Default)]
struct ProgramObject {
    linked: bool,
    fragment: Option<String>,
    uniforms: Vec<String>,
    attributes: Vec<String>,
    values: HashMap<String, Value>,
}

pub(crate) struct TextureObject {
    width: usize,
    height: usize,
    storage: Option<TextureStorage>,
    sampling: bool,
    pixels: Vec<Pixel>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, Vec<f32>>,
    textures: HashMap<u32, TextureObject>,
    framebuffers: HashMap<u32, Option<u32>>,
    current_program: Option<u32>,
    array_buffer: Option<u32>,
    enabled_attributes: HashSet<u32>,
    active_unit: u32,
    units: HashMap<u32, u32>,
    framebuffer: Option<u32>,
    viewport: (usize, usize),
    surface: Vec<Pixel>,
    events: Vec<Event>,
}

impl State {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn bound_texture(&self) -> u32 {
        *self
            .units
            .get(&self.active_unit)
            .unwrap_or_else(|| panic!("no texture bound on unit {}", self.active_unit))
    }
}

/// Inputs visible to a registered fragment closure for one pixel.
pub(crate) struct Fragment<'a> {
    pub x: usize,
    pub y: usize,
    state: &'a State,
    program: &'a ProgramObject,
    target: Option<u32>,
}

impl Fragment<'_> {
    pub fn float(&self, name: &str) -> f32 {
        match self.program.values.get(name) {
            Some(Value::Floats(values)) => values[0],
            other => panic!("uniform `{name}` is not a float: {other:?}"),
        }
    }

    pub fn floats(&self, name: &str) -> Vec<f32> {
        match self.program.values.get(name) {
            Some(Value::Floats(values)) => values.clone(),
            other => panic!("uniform `{name}` is not a float vector: {other:?}"),
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.program.values.get(name) {
            Some(Value::Int(value)) => *value,
            other => panic!("uniform `{name}` is not an int: {other:?}"),
        }
    }

    /// Samples the texture behind sampler uniform `name` at this pixel.
    /// Unset samplers read unit 0, as in GL.
    pub fn texture(&self, name: &str) -> Pixel {
        let unit = match self.program.values.get(name) {
            Some(Value::Int(unit)) => *unit as u32,
            None => 0,
            other => panic!("sampler `{name}` holds a non-integer value: {other:?}"),
        };
        let id = *self
            .state
            .units
            .get(&unit)
            .unwrap_or_else(|| panic!("sampler `{name}` reads empty unit {unit}"));
        assert_ne!(
            Some(id),
            self.target,
            "feedback loop: texture {id} sampled while bound as the render target"
        );
        let texture = &self.state.textures[&id];
        let x = self.x.min(texture.width - 1);
        let y = self.y.min(texture.height - 1);
        texture.pixels[y * texture.width + x]
    }
}

pub(crate) struct SoftGl {
    version: ContextVersion,
    extensions: HashSet<String>,
    fragments: HashMap<String, FragmentFn>,
    framebuffer_limit: Option<usize>,
    state: RefCell<State>,
}

impl SoftGl {
    pub fn baseline() -> Self {
        Self::new(
            ContextVersion {
                major: 2,
                minor: 0,
                embedded: true,
            },
            &["OES_texture_half_float"],
        )
    }

    pub fn extended() -> Self {
        Self::new(
            ContextVersion {
                major: 3,
                minor: 0,
                embedded: true,
            },
            &["GL_EXT_color_buffer_float"],
        )
    }

    pub fn new(version: ContextVersion, extensions: &[&str]) -> Self {
        Self {
            version,
            extensions: extensions.iter().map(|name| name.to_string()).collect(),
            fragments: HashMap::new(),
            framebuffer_limit: None,
            state: RefCell::new(State::default()),
        }
    }

    pub fn without_extensions(mut self) -> Self {
        self.extensions.clear();
        self
    }

    /// Makes `create_framebuffer` fail once `limit` framebuffers are live.
    pub fn with_framebuffer_limit(mut self, limit: usize) -> Self {
        self.framebuffer_limit = Some(limit);
        self
    }

    /// Registers the behaviour of a fragment source; only registered sources compile.
    pub fn with_fragment<F>(mut self, source: &str, program: F) -> Self
    where
        F: Fn(&Fragment<'_>) -> Pixel + 'static,
    {
        self.fragments.insert(source.to_string(), Rc::new(program));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, Event::Draw { .. }))
            .count()
    }

    /// Values uploaded to uniform `name` of any program, in call order.
    pub fn uploads(&self, name: &str) -> Vec<Value> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|event| match event {
                Event::Uniform {
                    name: uploaded,
                    value,
                    ..
                } if uploaded == name => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn surface_pixel(&self, x: usize, y: usize) -> Pixel {
        let state = self.state.borrow();
        state.surface[y * state.viewport.0 + x]
    }

    pub fn surface_pixels(&self) -> Vec<Pixel> {
        self.state.borrow().surface.clone()
    }

    pub fn texture_size(&self, texture: u32) -> (usize, usize) {
        let state = self.state.borrow();
        let object = &state.textures[&texture];
        (object.width, object.height)
    }

    pub fn texture_storage(&self, texture: u32) -> Option<TextureStorage> {
        self.state.borrow().textures[&texture].storage
    }

    pub fn texture_sampling_set(&self, texture: u32) -> bool {
        self.state.borrow().textures[&texture].sampling
    }

    pub fn texture_pixel(&self, texture: u32, x: usize, y: usize) -> Pixel {
        let state = self.state.borrow();
        let object = &state.textures[&texture];
        object.pixels[y * object.width + x]
    }

    pub fn is_live_texture(&self, texture: u32) -> bool {
        self.state.borrow().textures.contains_key(&texture)
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    fn push(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }

    fn set_uniform(&self, location: &SoftLocation, value: Value) {
        let mut state = self.state.borrow_mut();
        assert_eq!(
            state.current_program,
            Some(location.program),
            "uniform `{}` uploaded while its program is not in use",
            location.name
        );
        let program = state
            .programs
            .get_mut(&location.program)
            .expect("uniform location outlived its program");
        program
            .values
            .insert(location.name.clone(), value.clone());
        state.events.push(Event::Uniform {
            program: location.program,
            name: location.name.clone(),
            value,
        });
    }
}

fn declarations(source: &str, keywords: &[&str]) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = keywords
                .iter()
                .find_map(|keyword| line.strip_prefix(keyword)?.strip_prefix(' '))?;
            rest.trim_end_matches(';')
                .split_whitespace()
                .last()
                .map(str::to_string)
        })
        .collect()
}

impl Gl for SoftGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type Framebuffer = u32;
    type UniformLocation = SoftLocation;

    fn version(&self) -> ContextVersion {
        self.version
    }

    fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name) || self.extensions.contains(&format!("GL_{name}"))
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: None,
                compiled: false,
            },
        );
        Ok(id)
    }

    fn compile_shader(&self, shader: u32, source: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let object = state.shaders.get_mut(&shader).expect("unknown shader");
        object.source = Some(source.to_string());
        let ok = match object.stage {
            ShaderStage::Vertex => source.contains("gl_Position"),
            ShaderStage::Fragment => self.fragments.contains_key(source),
        };
        object.compiled = ok;
        if ok {
            Ok(())
        } else {
            Err("ERROR: 0:1: unrecognised shader source".to_string())
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn link_program(&self, program: u32, shaders: &[u32]) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let mut linked = ProgramObject::default();
        let mut stages = HashSet::new();
        for shader in shaders {
            let object = &state.shaders[shader];
            if !object.compiled {
                return Err("link failed: attached shader did not compile".to_string());
            }
            let source = object.source.as_deref().unwrap_or_default();
            stages.insert(object.stage);
            linked.uniforms.extend(declarations(source, &["uniform"]));
            match object.stage {
                ShaderStage::Vertex => {
                    linked.attributes = declarations(source, &["attribute", "in"]);
                }
                ShaderStage::Fragment => linked.fragment = Some(source.to_string()),
            }
        }
        if stages.len() != 2 {
            return Err("link failed: program needs a vertex and a fragment shader".to_string());
        }
        linked.linked = true;
        state.programs.insert(program, linked);
        Ok(())
    }

    fn use_program(&self, program: Option<u32>) {
        self.state.borrow_mut().current_program = program;
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<SoftLocation> {
        let state = self.state.borrow();
        state.programs[&program]
            .uniforms
            .iter()
            .any(|declared| declared == name)
            .then(|| SoftLocation {
                program,
                name: name.to_string(),
            })
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        let state = self.state.borrow();
        state.programs[&program]
            .attributes
            .iter()
            .position(|declared| declared == name)
            .map(|index| index as u32)
    }

    fn uniform_1f(&self, location: &SoftLocation, x: f32) {
        self.set_uniform(location, Value::Floats(vec![x]));
    }

    fn uniform_2f(&self, location: &SoftLocation, x: f32, y: f32) {
        self.set_uniform(location, Value::Floats(vec![x, y]));
    }

    fn uniform_3f(&self, location: &SoftLocation, x: f32, y: f32, z: f32) {
        self.set_uniform(location, Value::Floats(vec![x, y, z]));
    }

    fn uniform_4f(&self, location: &SoftLocation, x: f32, y: f32, z: f32, w: f32) {
        self.set_uniform(location, Value::Floats(vec![x, y, z, w]));
    }

    fn uniform_1i(&self, location: &SoftLocation, x: i32) {
        self.set_uniform(location, Value::Int(x));
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.buffers.insert(id, Vec::new());
        Ok(id)
    }

    fn bind_array_buffer(&self, buffer: Option<u32>) {
        self.state.borrow_mut().array_buffer = buffer;
    }

    fn array_buffer_data(&self, data: &[f32]) {
        let mut state = self.state.borrow_mut();
        let buffer = state.array_buffer.expect("no array buffer bound");
        state.buffers.insert(buffer, data.to_vec());
    }

    fn delete_buffer(&self, buffer: u32) {
        self.state.borrow_mut().buffers.remove(&buffer);
    }

    fn enable_vertex_attrib(&self, index: u32, components: i32) {
        let mut state = self.state.borrow_mut();
        assert_eq!(components, 2, "quad positions are vec2");
        assert!(state.array_buffer.is_some(), "attribute enabled without a buffer");
        state.enabled_attributes.insert(index);
    }

    fn disable_vertex_attrib(&self, index: u32) {
        self.state.borrow_mut().enabled_attributes.remove(&index);
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        assert_eq!((first, count), (0, 4), "only the full-screen quad is drawn");
        let (target, width, height, pixels) = {
            let state = self.state.borrow();
            let program_id = state.current_program.expect("draw without a program");
            let program = &state.programs[&program_id];
            assert!(program.linked, "draw with an unlinked program");
            let buffer = state.array_buffer.expect("draw without a vertex buffer");
            assert_eq!(state.buffers[&buffer].len(), 8, "quad buffer holds 4 vec2");
            assert!(
                state.enabled_attributes.contains(&0),
                "position attribute not enabled"
            );

            let target = state.framebuffer.map(|framebuffer| {
                state.framebuffers[&framebuffer].expect("framebuffer has no color attachment")
            });
            let (width, height) = match target {
                Some(texture) => {
                    let object = &state.textures[&texture];
                    (object.width, object.height)
                }
                None => state.viewport,
            };
            assert_eq!(
                (width, height),
                state.viewport,
                "viewport does not cover the render target"
            );

            let fragment = program
                .fragment
                .as_ref()
                .and_then(|source| self.fragments.get(source))
                .expect("linked program has a registered fragment")
                .clone();
            let mut pixels = Vec::with_capacity(width * height);
            for y in 0..height {
                for x in 0..width {
                    pixels.push(fragment(&Fragment {
                        x,
                        y,
                        state: &state,
                        program,
                        target,
                    }));
                }
            }
            (target, width, height, pixels)
        };

        let mut state = self.state.borrow_mut();
        let program = state.current_program.unwrap_or_default();
        match target {
            Some(texture) => {
                let object = state.textures.get_mut(&texture).expect("target texture");
                debug_assert_eq!(object.pixels.len(), width * height);
                object.pixels = pixels;
            }
            None => state.surface = pixels,
        }
        state.events.push(Event::Draw { program, target });
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.textures.insert(
            id,
            TextureObject {
                width: 0,
                height: 0,
                storage: None,
                sampling: false,
                pixels: Vec::new(),
            },
        );
        Ok(id)
    }

    fn active_texture(&self, unit: u32) {
        self.state.borrow_mut().active_unit = unit;
    }

    fn bind_texture(&self, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        let unit = state.active_unit;
        match texture {
            Some(texture) => {
                assert!(state.textures.contains_key(&texture), "binding a deleted texture");
                state.units.insert(unit, texture);
            }
            None => {
                state.units.remove(&unit);
            }
        }
    }

    fn tex_image_2d(&self, width: i32, height: i32, storage: TextureStorage) {
        let texture = {
            let mut state = self.state.borrow_mut();
            let texture = state.bound_texture();
            let object = state.textures.get_mut(&texture).expect("bound texture");
            object.width = width as usize;
            object.height = height as usize;
            object.storage = Some(storage);
            object.pixels = vec![[f32::NAN; 4]; (width * height) as usize];
            texture
        };
        self.push(Event::TexImage {
            texture,
            width,
            height,
            storage,
        });
    }

    fn set_linear_clamp(&self) {
        let mut state = self.state.borrow_mut();
        let texture = state.bound_texture();
        state
            .textures
            .get_mut(&texture)
            .expect("bound texture")
            .sampling = true;
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture);
        state.units.retain(|_, bound| *bound != texture);
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        if self
            .framebuffer_limit
            .is_some_and(|limit| state.framebuffers.len() >= limit)
        {
            return Err("out of framebuffer objects".to_string());
        }
        let id = state.allocate_id();
        state.framebuffers.insert(id, None);
        Ok(id)
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        self.state.borrow_mut().framebuffer = framebuffer;
        self.push(Event::BindFramebuffer(framebuffer));
    }

    fn attach_color_texture(&self, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        let framebuffer = state.framebuffer.expect("no framebuffer bound");
        state.framebuffers.insert(framebuffer, texture);
    }

    fn framebuffer_complete(&self) -> bool {
        let state = self.state.borrow();
        state
            .framebuffer
            .and_then(|framebuffer| state.framebuffers[&framebuffer])
            .and_then(|texture| state.textures.get(&texture))
            .is_some_and(|texture| texture.storage.is_some() && texture.width > 0)
    }

    fn clear_color_buffer(&self, rgba: [f32; 4]) {
        let target = {
            let mut state = self.state.borrow_mut();
            let target = state.framebuffer.map(|framebuffer| {
                state.framebuffers[&framebuffer].expect("framebuffer has no color attachment")
            });
            match target {
                Some(texture) => state
                    .textures
                    .get_mut(&texture)
                    .expect("target texture")
                    .pixels
                    .fill(rgba),
                None => state.surface.fill(rgba),
            }
            target
        };
        self.push(Event::Clear { target });
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        let mut state = self.state.borrow_mut();
        state.framebuffers.remove(&framebuffer);
        if state.framebuffer == Some(framebuffer) {
            state.framebuffer = None;
        }
    }

    fn viewport(&self, width: i32, height: i32) {
        {
            let mut state = self.state.borrow_mut();
            let size = (width as usize, height as usize);
            if state.viewport != size {
                state.viewport = size;
                state.surface = vec![[0.0; 4]; size.0 * size.1];
            }
        }
        self.push(Event::Viewport(width, height));
    }
}

/// Surface whose presented size tests change between iterations.
pub(crate) struct SoftSurface {
    pub presented: (u32, u32),
    backing: (u32, u32),
    pub resizes: Vec<(u32, u32)>,
    pub presents: usize,
}

impl SoftSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            presented: (width, height),
            backing: (300, 150),
            resizes: Vec::new(),
            presents: 0,
        }
    }
}

impl Surface for SoftSurface {
    fn presented_size(&self) -> (u32, u32) {
        self.presented
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.resizes.push((width, height));
    }

    fn present(&mut self) -> Result<()> {
        self.presents += 1;
        Ok(())
    }
}
