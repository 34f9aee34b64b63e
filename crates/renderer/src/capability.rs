//! Context-tier differences: which extensions are required and how
//! half-float render targets are allocated.

use tracing::debug;

use crate::error::{Error, Result};
use crate::gl::{ContextVersion, Gl, TextureStorage};

/// `HALF_FLOAT_OES` from `OES_texture_half_float`; differs from the core `HALF_FLOAT`.
const HALF_FLOAT_OES: u32 = 0x8D61;

const BASELINE_EXTENSIONS: &[&str] = &["OES_texture_half_float"];
const EXTENDED_EMBEDDED_EXTENSIONS: &[&str] = &["EXT_color_buffer_float"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// GLES 2 / WebGL 1 class contexts.
    Baseline,
    /// GLES 3 / WebGL 2 class contexts and desktop GL 3+.
    Extended,
}

impl Capability {
    pub fn for_version(version: ContextVersion) -> Self {
        if version.major >= 3 {
            Capability::Extended
        } else {
            Capability::Baseline
        }
    }

    /// Picks the tier for the context's version and checks its extensions.
    pub fn probe<G: Gl>(gl: &G) -> Result<Self> {
        let version = gl.version();
        let capability = Self::for_version(version);
        if let Some(missing) = capability
            .required_extensions(version)
            .iter()
            .copied()
            .find(|name| !gl.has_extension(name))
        {
            return Err(Error::MissingExtension(missing));
        }
        debug!(
            ?capability,
            major = version.major,
            minor = version.minor,
            embedded = version.embedded,
            "selected context tier"
        );
        Ok(capability)
    }

    /// Desktop GL 3+ renders to half-float targets natively.
    pub fn required_extensions(self, version: ContextVersion) -> &'static [&'static str] {
        match self {
            Capability::Baseline => BASELINE_EXTENSIONS,
            Capability::Extended if version.embedded => EXTENDED_EMBEDDED_EXTENSIONS,
            Capability::Extended => &[],
        }
    }

    pub fn storage(self) -> TextureStorage {
        match self {
            Capability::Baseline => TextureStorage {
                internal_format: glow::RGBA as i32,
                format: glow::RGBA,
                data_type: HALF_FLOAT_OES,
            },
            Capability::Extended => TextureStorage {
                internal_format: glow::RGBA16F as i32,
                format: glow::RGBA,
                data_type: glow::HALF_FLOAT,
            },
        }
    }

    /// Allocates an uninitialised `width`×`height` half-float RGBA texture
    /// and leaves it bound on the active unit.
    pub fn allocate_render_target<G: Gl>(
        self,
        gl: &G,
        width: u32,
        height: u32,
    ) -> Result<G::Texture> {
        let texture = gl.create_texture().map_err(Error::Gpu)?;
        gl.bind_texture(Some(texture));
        gl.tex_image_2d(width as i32, height as i32, self.storage());
        Ok(texture)
    }
}
