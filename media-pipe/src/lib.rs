/// Registers FFmpeg components (formats, codecs, devices such as lavfi).
/// Call once at startup before opening any input or output.
pub fn init() -> Result<()> {
    ffmpeg_next::init()?;
    Ok(())
}

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod frame;
pub mod image;
pub mod input;
pub mod metadata;
pub mod output;
pub mod packet;
pub mod pipeline;
pub mod registry;
pub mod scaler;
pub mod stream;
pub mod time;

pub use error::{Error, Result};
pub use metadata::probe;
