use tracing::trace;

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::feedback::FeedbackBuffer;
use crate::gl::Gl;
use crate::uniforms::{FrameContext, UniformSetter, UniformTable};

/// One full-screen shader pass.
///
/// Buffered passes render into their own [`FeedbackBuffer`] and can sample
/// the previous frame; direct passes render straight to the bound surface.
pub struct Pass<G: Gl> {
    id: String,
    program: G::Program,
    attribute: u32,
    uniforms: Vec<BoundUniform<G>>,
    kind: PassKind<G>,
}

enum PassKind<G: Gl> {
    Direct,
    Buffered(FeedbackBuffer<G>),
}

struct BoundUniform<G: Gl> {
    name: String,
    location: G::UniformLocation,
    setter: UniformSetter<G>,
}

impl<G: Gl> Pass<G> {
    /// Resolves the attribute and every uniform location of `program` once.
    /// Uniforms the program does not declare are dropped.
    pub(crate) fn new(
        gl: &G,
        capability: Capability,
        id: &str,
        program: G::Program,
        attribute: &str,
        uniforms: UniformTable<G>,
        buffered: bool,
    ) -> Result<Self> {
        let attribute_location =
            gl.attrib_location(program, attribute)
                .ok_or_else(|| Error::MissingAttribute {
                    id: id.to_string(),
                    name: attribute.to_string(),
                })?;

        let uniforms = uniforms
            .into_entries()
            .filter_map(|(name, setter)| match gl.uniform_location(program, &name) {
                Some(location) => Some(BoundUniform {
                    name,
                    location,
                    setter,
                }),
                None => {
                    trace!(pass = id, uniform = %name, "uniform not declared; skipping");
                    None
                }
            })
            .collect();

        let kind = if buffered {
            PassKind::Buffered(FeedbackBuffer::new(gl, capability)?)
        } else {
            PassKind::Direct
        };

        Ok(Self {
            id: id.to_string(),
            program,
            attribute: attribute_location,
            uniforms,
            kind,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.kind, PassKind::Buffered(_))
    }

    pub fn attribute(&self) -> u32 {
        self.attribute
    }

    /// Names of the uniforms that resolved to a location.
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.iter().map(|uniform| uniform.name.as_str())
    }

    pub fn feedback(&self) -> Option<&FeedbackBuffer<G>> {
        match &self.kind {
            PassKind::Direct => None,
            PassKind::Buffered(feedback) => Some(feedback),
        }
    }

    pub fn initialize(&mut self, gl: &G, width: u32, height: u32) -> Result<()> {
        match &mut self.kind {
            PassKind::Direct => Ok(()),
            PassKind::Buffered(feedback) => feedback.initialize(gl, width, height),
        }
    }

    /// Applies every bound uniform, then hands the attribute to `draw_quad`.
    /// Buffered passes only run the geometry draw inside their feedback scope.
    pub fn draw<F>(&self, gl: &G, frame: &FrameContext<'_, G>, draw_quad: F) -> Result<()>
    where
        F: FnOnce(u32),
    {
        gl.use_program(Some(self.program));
        for uniform in &self.uniforms {
            (uniform.setter)(gl, &uniform.location, frame);
        }

        let result = match &self.kind {
            PassKind::Direct => {
                draw_quad(self.attribute);
                Ok(())
            }
            PassKind::Buffered(feedback) => feedback.draw(gl, || {
                draw_quad(self.attribute);
                Ok(())
            }),
        };

        frame.release_units(gl);
        gl.use_program(None);
        result
    }

    pub fn after_frame(&mut self) {
        if let PassKind::Buffered(feedback) = &mut self.kind {
            feedback.swap();
        }
    }

    pub(crate) fn release(&mut self, gl: &G) {
        if let PassKind::Buffered(feedback) = std::mem::replace(&mut self.kind, PassKind::Direct) {
            feedback.release(gl);
        }
    }
}
