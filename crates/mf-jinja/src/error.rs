//! Error types for mf-jinja

use thiserror::Error;

/// Script loading and templating errors
#[derive(Error, Debug)]
pub enum JinjaError {
    /// Template render error (J001)
    #[error("[J001] Unable to render template {path}: {message}")]
    RenderError { path: String, message: String },

    /// Script could not be accessed or read (J002)
    #[error("[J002] Could not access the file on path {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for JinjaError
pub type JinjaResult<T> = Result<T, JinjaError>;
