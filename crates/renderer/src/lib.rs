//! Multi-pass full-screen shader renderer for animated backgrounds.
//!
//! A pass list is an ordered set of fragment shaders. Every pass except the
//! last renders into a pair of half-float textures it can read back on the
//! next frame; the last pass renders to the surface. The flow per refresh is:
//!
//! ```text
//!   Driver::iterate
//!      ├─ resize?  ──▶ viewport, F = 0, Pass::initialize (reallocate targets)
//!      ├─ Pass::draw for each pass (uniform setters ──▶ quad)
//!      ├─ F += 1
//!      ├─ Pass::after_frame (swap read/write)
//!      └─ Surface::present
//! ```
//!
//! The engine talks to the GPU through the [`Gl`] trait. [`window`] hosts it in
//! a winit window with a glutin OpenGL ES context.

mod capability;
mod context;
mod driver;
mod error;
mod feedback;
mod gl;
mod pass;
#[cfg(test)]
mod soft;
mod surface;
mod uniforms;
pub mod window;

pub use capability::Capability;
pub use context::{Context, VERTEX_ATTRIBUTE};
pub use driver::{Driver, Flow, PassSource, StopHandle};
pub use error::{Error, ErrorKind, Result};
pub use feedback::{FeedbackBuffer, FEEDBACK_UNIT};
pub use gl::{ContextVersion, Gl, ShaderStage, TextureStorage};
pub use pass::Pass;
pub use surface::Surface;
pub use uniforms::{
    FrameContext, RenderState, UniformSetter, UniformTable, UniformValue, FRAME, MIN_DIMENSION,
    RESOLUTION, TIME,
};
pub use window::{NativeGl, TierPreference, WindowConfig};
