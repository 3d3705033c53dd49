//! Error taxonomy for the pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a pipeline run can hit. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad arguments or an unusable combination of settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// The stream registry found nothing to select.
    #[error("no {kind} stream found in source {source_id}")]
    NoMatchingStream {
        /// Selector that matched nothing, e.g. "video".
        kind: &'static str,
        /// Source container the selector was applied to.
        source_id: usize,
    },

    /// A context or buffer could not be created.
    #[error("allocation failed: {0}")]
    Alloc(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The decoder rejected a packet or failed while producing frames.
    #[error("decode error: {0}")]
    Decode(String),

    /// The encoder rejected a frame or failed while producing packets.
    #[error("encode error: {0}")]
    Encode(String),

    /// The pixel converter could not be initialised or failed to run.
    #[error("conversion error: {0}")]
    Convert(String),

    /// Writing header, packet or trailer to the output container failed.
    #[error("mux error: {0}")]
    Mux(String),

    /// A stage was driven out of order (e.g. submit before drain completed).
    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Ffmpeg(#[from] ffmpeg_next::Error),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
