//! The slice of OpenGL ES the engine talks to.
//!
//! Everything above this module is written against [`Gl`] rather than a
//! concrete binding. `glow::Context` is the production implementation; the
//! test suite swaps in a software rasteriser so feedback, resize and uniform
//! behaviour can be checked without a GPU.

use std::fmt;

use glow::HasContext;

/// Which programmable stage a shader object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// GL version reported by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextVersion {
    pub major: u32,
    pub minor: u32,
    /// True for OpenGL ES and WebGL contexts.
    pub embedded: bool,
}

/// Arguments for a `glTexImage2D` storage allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureStorage {
    pub internal_format: i32,
    pub format: u32,
    pub data_type: u32,
}

pub trait Gl: 'static {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + PartialEq + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type Texture: Copy + PartialEq + fmt::Debug;
    type Framebuffer: Copy + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    fn version(&self) -> ContextVersion;
    /// Extension lookup by its WebGL name; `GL_`-prefixed native names also match.
    fn has_extension(&self, name: &str) -> bool;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    /// Uploads `source` and compiles it, returning the info log on failure.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    /// Attaches `shaders` and links, returning the info log on failure.
    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader]) -> Result<(), String>;
    fn use_program(&self, program: Option<Self::Program>);
    fn delete_program(&self, program: Self::Program);
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn uniform_1f(&self, location: &Self::UniformLocation, x: f32);
    fn uniform_2f(&self, location: &Self::UniformLocation, x: f32, y: f32);
    fn uniform_3f(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32);
    fn uniform_4f(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32, w: f32);
    fn uniform_1i(&self, location: &Self::UniformLocation, x: i32);

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>);
    /// Fills the bound array buffer with static vertex data.
    fn array_buffer_data(&self, data: &[f32]);
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Enables `index` and points it at tightly packed `components`-wide floats.
    fn enable_vertex_attrib(&self, index: u32, components: i32);
    fn disable_vertex_attrib(&self, index: u32);
    fn draw_triangle_strip(&self, first: i32, count: i32);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    fn tex_image_2d(&self, width: i32, height: i32, storage: TextureStorage);
    /// Linear min/mag filtering and clamp-to-edge wrapping on the bound texture.
    fn set_linear_clamp(&self);
    fn delete_texture(&self, texture: Self::Texture);

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    fn attach_color_texture(&self, texture: Option<Self::Texture>);
    fn framebuffer_complete(&self) -> bool;
    /// Fills the whole color target of the bound framebuffer with `rgba`.
    fn clear_color_buffer(&self, rgba: [f32; 4]);
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);

    fn viewport(&self, width: i32, height: i32);
}

impl Gl for glow::Context {
    type Shader = <glow::Context as HasContext>::Shader;
    type Program = <glow::Context as HasContext>::Program;
    type Buffer = <glow::Context as HasContext>::Buffer;
    type Texture = <glow::Context as HasContext>::Texture;
    type Framebuffer = <glow::Context as HasContext>::Framebuffer;
    type UniformLocation = <glow::Context as HasContext>::UniformLocation;

    fn version(&self) -> ContextVersion {
        let version = HasContext::version(self);
        ContextVersion {
            major: version.major,
            minor: version.minor,
            embedded: version.is_embedded,
        }
    }

    fn has_extension(&self, name: &str) -> bool {
        let extensions = self.supported_extensions();
        extensions.contains(name) || extensions.contains(&format!("GL_{name}"))
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, kind) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.shader_source(shader, source);
            HasContext::compile_shader(self, shader);
            if self.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.get_shader_info_log(shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn link_program(&self, program: Self::Program, shaders: &[Self::Shader]) -> Result<(), String> {
        unsafe {
            for shader in shaders {
                self.attach_shader(program, *shader);
            }
            HasContext::link_program(self, program);
            for shader in shaders {
                self.detach_shader(program, *shader);
            }
            if self.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.get_program_info_log(program))
            }
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn uniform_1f(&self, location: &Self::UniformLocation, x: f32) {
        unsafe { self.uniform_1_f32(Some(location), x) }
    }

    fn uniform_2f(&self, location: &Self::UniformLocation, x: f32, y: f32) {
        unsafe { self.uniform_2_f32(Some(location), x, y) }
    }

    fn uniform_3f(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32) {
        unsafe { self.uniform_3_f32(Some(location), x, y, z) }
    }

    fn uniform_4f(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32, w: f32) {
        unsafe { self.uniform_4_f32(Some(location), x, y, z, w) }
    }

    fn uniform_1i(&self, location: &Self::UniformLocation, x: i32) {
        unsafe { self.uniform_1_i32(Some(location), x) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>) {
        unsafe { self.bind_buffer(glow::ARRAY_BUFFER, buffer) }
    }

    fn array_buffer_data(&self, data: &[f32]) {
        unsafe {
            self.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(data),
                glow::STATIC_DRAW,
            )
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn enable_vertex_attrib(&self, index: u32, components: i32) {
        unsafe {
            self.enable_vertex_attrib_array(index);
            self.vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, 0, 0);
        }
    }

    fn disable_vertex_attrib(&self, index: u32) {
        unsafe { self.disable_vertex_attrib_array(index) }
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        unsafe { self.draw_arrays(glow::TRIANGLE_STRIP, first, count) }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { HasContext::create_texture(self) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        unsafe { HasContext::bind_texture(self, glow::TEXTURE_2D, texture) }
    }

    fn tex_image_2d(&self, width: i32, height: i32, storage: TextureStorage) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                glow::TEXTURE_2D,
                0,
                storage.internal_format,
                width,
                height,
                0,
                storage.format,
                storage.data_type,
                None,
            )
        }
    }

    fn set_linear_clamp(&self) {
        unsafe {
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            self.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
        }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        unsafe { HasContext::create_framebuffer(self) }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, framebuffer) }
    }

    fn attach_color_texture(&self, texture: Option<Self::Texture>) {
        unsafe {
            self.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture,
                0,
            )
        }
    }

    fn framebuffer_complete(&self) -> bool {
        unsafe { self.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
    }

    fn clear_color_buffer(&self, [red, green, blue, alpha]: [f32; 4]) {
        unsafe {
            self.clear_color(red, green, blue, alpha);
            HasContext::clear(self, glow::COLOR_BUFFER_BIT);
        }
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn viewport(&self, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, 0, 0, width, height) }
    }
}
