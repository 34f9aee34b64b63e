use tracing::trace;

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::gl::Gl;

/// Texture unit a buffered pass reads its own previous frame from.
pub const FEEDBACK_UNIT: u32 = 0;

/// Two render targets sharing one framebuffer. A pass draws into `write`
/// while sampling `read`; the roles flip once per frame.
pub struct FeedbackBuffer<G: Gl> {
    capability: Capability,
    framebuffer: G::Framebuffer,
    targets: Option<Targets<G>>,
}

struct Targets<G: Gl> {
    read: G::Texture,
    write: G::Texture,
    size: (u32, u32),
}

impl<G: Gl> FeedbackBuffer<G> {
    pub fn new(gl: &G, capability: Capability) -> Result<Self> {
        let framebuffer = gl.create_framebuffer().map_err(Error::Gpu)?;
        Ok(Self {
            capability,
            framebuffer,
            targets: None,
        })
    }

    /// Reallocates both targets at `width`×`height` and clears them to zero.
    /// Previous contents are discarded.
    pub fn initialize(&mut self, gl: &G, width: u32, height: u32) -> Result<()> {
        self.release_targets(gl);

        let read = self.allocate(gl, width, height)?;
        let write = match self.allocate(gl, width, height) {
            Ok(texture) => texture,
            Err(err) => {
                gl.delete_texture(read);
                return Err(err);
            }
        };
        self.targets = Some(Targets {
            read,
            write,
            size: (width, height),
        });

        // Storage allocated without data is undefined until written.
        gl.bind_framebuffer(Some(self.framebuffer));
        let mut complete = true;
        for target in [read, write] {
            gl.attach_color_texture(Some(target));
            complete = gl.framebuffer_complete();
            if !complete {
                break;
            }
            gl.clear_color_buffer([0.0; 4]);
        }
        gl.attach_color_texture(None);
        gl.bind_framebuffer(None);
        if !complete {
            return Err(Error::Gpu(format!(
                "feedback framebuffer incomplete at {width}x{height}"
            )));
        }
        trace!(width, height, "feedback targets allocated");
        Ok(())
    }

    fn allocate(&self, gl: &G, width: u32, height: u32) -> Result<G::Texture> {
        let texture = self.capability.allocate_render_target(gl, width, height)?;
        gl.set_linear_clamp();
        gl.bind_texture(None);
        Ok(texture)
    }

    /// Runs `render` with the framebuffer targeting `write` and `read` bound on
    /// [`FEEDBACK_UNIT`], restoring default bindings afterwards.
    pub fn draw<F>(&self, gl: &G, render: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let targets = self
            .targets
            .as_ref()
            .ok_or_else(|| Error::Gpu("feedback buffer drawn before initialize".to_string()))?;

        gl.bind_framebuffer(Some(self.framebuffer));
        gl.attach_color_texture(Some(targets.write));
        gl.active_texture(FEEDBACK_UNIT);
        gl.bind_texture(Some(targets.read));

        let result = render();

        gl.attach_color_texture(None);
        gl.active_texture(FEEDBACK_UNIT);
        gl.bind_texture(None);
        gl.bind_framebuffer(None);
        result
    }

    pub fn swap(&mut self) {
        if let Some(targets) = self.targets.as_mut() {
            std::mem::swap(&mut targets.read, &mut targets.write);
        }
    }

    pub fn read(&self) -> Option<G::Texture> {
        self.targets.as_ref().map(|targets| targets.read)
    }

    pub fn write(&self) -> Option<G::Texture> {
        self.targets.as_ref().map(|targets| targets.write)
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.targets.as_ref().map(|targets| targets.size)
    }

    fn release_targets(&mut self, gl: &G) {
        if let Some(targets) = self.targets.take() {
            gl.delete_texture(targets.read);
            gl.delete_texture(targets.write);
        }
    }

    pub fn release(mut self, gl: &G) {
        self.release_targets(gl);
        gl.delete_framebuffer(self.framebuffer);
    }
}
