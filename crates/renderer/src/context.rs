use tracing::{debug, error};

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::gl::{Gl, ShaderStage};
use crate::pass::Pass;
use crate::uniforms::UniformTable;

/// Position attribute of the built-in vertex shaders.
pub const VERTEX_ATTRIBUTE: &str = "V";

const VERTEX_SOURCE_100: &str = "attribute vec2 V;\nvoid main() {\n    gl_Position = vec4(V, 0.0, 1.0);\n}\n";
const VERTEX_SOURCE_300: &str =
    "#version 300 es\nin vec2 V;\nvoid main() {\n    gl_Position = vec4(V, 0.0, 1.0);\n}\n";

/// Triangle-strip corners covering clip space.
const QUAD: [f32; 8] = [-1.0, 1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0];

/// Owns the GL binding, the shared quad and every linked program.
pub struct Context<G: Gl> {
    gl: G,
    capability: Capability,
    quad: G::Buffer,
    programs: Vec<G::Program>,
}

impl<G: Gl> Context<G> {
    pub fn new(gl: G) -> Result<Self> {
        let capability = Capability::probe(&gl)?;

        let quad = gl.create_buffer().map_err(Error::Gpu)?;
        gl.bind_array_buffer(Some(quad));
        gl.array_buffer_data(&QUAD);
        gl.bind_array_buffer(None);

        Ok(Self {
            gl,
            capability,
            quad,
            programs: Vec::new(),
        })
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Vertex shader matching the GLSL dialect of `fragment`. GLSL ES 3.00
    /// fragments need a 3.00 vertex stage; everything else gets 1.00, which
    /// extended contexts accept as well.
    pub fn vertex_source_for(&self, fragment: &str) -> &'static str {
        if declares_glsl_300(fragment) {
            VERTEX_SOURCE_300
        } else {
            VERTEX_SOURCE_100
        }
    }

    pub fn compile_and_link(&mut self, vertex: &str, fragment: &str, id: &str) -> Result<G::Program> {
        let vertex = self.compile(ShaderStage::Vertex, vertex, id)?;
        let fragment = match self.compile(ShaderStage::Fragment, fragment, id) {
            Ok(shader) => shader,
            Err(err) => {
                self.gl.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = self.link(id, &[vertex, fragment]);
        self.gl.delete_shader(vertex);
        self.gl.delete_shader(fragment);
        let program = linked?;
        self.programs.push(program);
        debug!(pass = id, "program linked");
        Ok(program)
    }

    fn compile(&self, stage: ShaderStage, source: &str, id: &str) -> Result<G::Shader> {
        let shader = self.gl.create_shader(stage).map_err(Error::Gpu)?;
        if let Err(log) = self.gl.compile_shader(shader, source) {
            error!(pass = id, %stage, log = %log.trim_end(), "shader compilation failed");
            self.gl.delete_shader(shader);
            return Err(Error::Compile {
                id: id.to_string(),
                stage,
                log: log.trim_end().to_string(),
            });
        }
        Ok(shader)
    }

    fn link(&self, id: &str, shaders: &[G::Shader]) -> Result<G::Program> {
        let program = self.gl.create_program().map_err(Error::Gpu)?;
        if let Err(log) = self.gl.link_program(program, shaders) {
            error!(pass = id, log = %log.trim_end(), "program link failed");
            self.gl.delete_program(program);
            return Err(Error::Link {
                id: id.to_string(),
                log: log.trim_end().to_string(),
            });
        }
        Ok(program)
    }

    /// Wraps a linked program with the built-in uniforms merged under `uniforms`.
    pub fn build_pass(
        &self,
        id: &str,
        program: G::Program,
        attribute: &str,
        uniforms: UniformTable<G>,
        buffered: bool,
    ) -> Result<Pass<G>> {
        let mut table = UniformTable::builtins();
        table.merge(uniforms);
        let offered = table.len();
        let pass = Pass::new(
            &self.gl,
            self.capability,
            id,
            program,
            attribute,
            table,
            buffered,
        )?;
        debug!(
            pass = id,
            buffered,
            offered,
            uniforms = ?pass.uniform_names().collect::<Vec<_>>(),
            "pass ready"
        );
        Ok(pass)
    }

    pub fn draw_quad(&self, attribute: u32) {
        self.gl.bind_array_buffer(Some(self.quad));
        self.gl.enable_vertex_attrib(attribute, 2);
        self.gl.draw_triangle_strip(0, 4);
        self.gl.disable_vertex_attrib(attribute);
        self.gl.bind_array_buffer(None);
    }

    pub fn update_viewport(&self, width: u32, height: u32) {
        self.gl.viewport(width as i32, height as i32);
    }
}

impl<G: Gl> Drop for Context<G> {
    fn drop(&mut self) {
        for program in self.programs.drain(..) {
            self.gl.delete_program(program);
        }
        self.gl.delete_buffer(self.quad);
    }
}

fn declares_glsl_300(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("//"))
        .and_then(|line| line.strip_prefix("#version"))
        .is_some_and(|version| version.trim_start().starts_with("300"))
}
