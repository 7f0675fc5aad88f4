//! Error types for surface, image, embed and configuration operations.
//!
//! None of these are fatal to the host page: the coordinator degrades to the
//! surface's default behavior or skips the single item that failed.

use miette::Diagnostic;
use thiserror::Error;

/// Errors reported by a `TextSurface` adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum SurfaceError {
    /// Offset lies past the end of the surface content.
    #[error("offset {offset} is out of bounds (len {len})")]
    #[diagnostic(code(hanji::surface::out_of_bounds))]
    OutOfBounds { offset: usize, len: usize },

    /// The surface has been unmounted.
    #[error("surface is no longer mounted")]
    #[diagnostic(code(hanji::surface::unmounted))]
    Unmounted,

    /// The surface is borrowed elsewhere (re-entrant event dispatch).
    #[error("surface is busy")]
    #[diagnostic(code(hanji::surface::busy))]
    Busy,

    /// The underlying widget refused the operation.
    #[error("platform error: {0}")]
    #[diagnostic(code(hanji::surface::platform))]
    Platform(String),
}

impl From<&str> for SurfaceError {
    fn from(s: &str) -> Self {
        SurfaceError::Platform(s.to_string())
    }
}

impl From<String> for SurfaceError {
    fn from(s: String) -> Self {
        SurfaceError::Platform(s)
    }
}

/// Errors from the image insertion pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum ImageError {
    /// More files were selected than the batch limit allows. No reads started.
    #[error("selected {selected} images, at most {max} are allowed")]
    #[diagnostic(
        code(hanji::image::too_many),
        help("select fewer images at a time")
    )]
    TooMany { selected: usize, max: usize },

    /// Reading one file failed.
    #[error("failed to read {name}: {reason}")]
    #[diagnostic(code(hanji::image::read))]
    Read { name: String, reason: String },

    /// The file content is not an image.
    #[error("{name} is not an image ({mime})")]
    #[diagnostic(code(hanji::image::not_an_image))]
    NotAnImage { name: String, mime: String },

    /// The surface rejected the embed.
    #[error("failed to insert {name}: {source}")]
    #[diagnostic(code(hanji::image::surface))]
    Surface {
        name: String,
        #[source]
        source: SurfaceError,
    },

    /// The file picker could not be opened.
    #[error("file picker failed: {0}")]
    #[diagnostic(code(hanji::image::picker))]
    Picker(String),

    /// The insertion task was cancelled before it reported back.
    #[error("image insertion for {name} was cancelled")]
    #[diagnostic(code(hanji::image::cancelled))]
    Cancelled { name: String },
}

/// Errors from embed URL handling.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum EmbedError {
    #[error("empty URL")]
    #[diagnostic(code(hanji::embed::empty))]
    EmptyUrl,

    #[error("unsupported URL scheme: {0}")]
    #[diagnostic(code(hanji::embed::scheme), help("use an http or https URL"))]
    UnsupportedScheme(String),
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("reposition delay of {given_ms}ms exceeds the {max_ms}ms bound")]
    #[diagnostic(
        code(hanji::config::delay),
        help("observed platform delays are between 10 and 50ms")
    )]
    DelayTooLong { given_ms: u128, max_ms: u128 },

    #[error("unknown enter workaround mode: {0}")]
    #[diagnostic(
        code(hanji::config::workaround),
        help("expected one of: always, ios, mobile, never")
    )]
    UnknownWorkaround(String),

    #[error("invalid value for {key}: {reason}")]
    #[diagnostic(code(hanji::config::invalid))]
    Invalid { key: String, reason: String },
}
