use crate::gl::ShaderStage;

/// Broad classification callers branch on when setup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing GL context, missing extension, or a malformed pass list.
    Configuration,
    /// Shader compile/link failures, incomplete framebuffers and other GL-level failures.
    Rendering,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable GL context: {0}")]
    NoContext(String),
    #[error("required GL extension `{0}` is not available")]
    MissingExtension(&'static str),
    #[error("invalid pass list: {0}")]
    InvalidPasses(String),
    #[error("failed to compile {stage} shader for pass `{id}`: {log}")]
    Compile {
        id: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("failed to link program for pass `{id}`: {log}")]
    Link { id: String, log: String },
    #[error("pass `{id}` does not declare vertex attribute `{name}`")]
    MissingAttribute { id: String, name: String },
    #[error("GL error: {0}")]
    Gpu(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoContext(_) | Error::MissingExtension(_) | Error::InvalidPasses(_) => {
                ErrorKind::Configuration
            }
            Error::Compile { .. }
            | Error::Link { .. }
            | Error::MissingAttribute { .. }
            | Error::Gpu(_) => ErrorKind::Rendering,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
