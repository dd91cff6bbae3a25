//! Recoverable errors of the renderer core.
use easyerr::Error;

use crate::device::Stage;

/// A shader permutation the device failed to compile.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to compile {stage:?} entry point {entry}: {message}")]
    Rejected {
        stage: Stage,
        entry: &'static str,
        message: String,
    },
}

/// Why a primitive batch was not drawn.
///
/// None of these leave the device state mirror inconsistent: the batch is simply skipped.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error(transparent)]
    ShaderCompilation { source: CompileError },
    #[error("unsupported draw: {f0}")]
    UnsupportedDraw(&'static str),
    #[error("draw has neither a colour nor a depth target")]
    NoRenderTarget,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse { source: ron::error::SpannedError },
}
