use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    config::DecodeConfig,
    decoder::{DecodeEngine, VideoDecoder},
    error::Result,
    frame::RawVideoFrame,
    image::write_image,
    input::AvInput,
    registry::{StreamRegistry, StreamSelector},
    scaler::Converter,
};

const SOURCE: usize = 0;

#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    /// Written images in frame order.
    pub files: Vec<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl DecodeReport {
    pub fn frames(&self) -> usize {
        self.files.len()
    }
}

/// Name of the `n`th (1-based) image written for `prefix`.
pub(crate) fn image_path(prefix: &str, n: usize, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}-{}.{}", prefix, n, extension))
}

/// Decodes the video stream of `input` and writes every frame as an image
/// named `<prefix>-<n>.<ext>`, counting from 1.
pub fn decode_to_images(input: &Path, prefix: &str, config: &DecodeConfig) -> Result<DecodeReport> {
    let size = config.size()?;
    let mut source = AvInput::open(input)?;
    let mut registry = StreamRegistry::new();
    let selected = registry.register_first(SOURCE, source.streams(), StreamSelector::Video)?;
    let stream = &registry.outputs()[selected];

    let decoder = VideoDecoder::from_stream(stream, config.decoder.as_deref())?;
    let (width, height) = size.unwrap_or((decoder.width(), decoder.height()));
    log::info!(
        "decoding {} to {}-N.{} at {}x{}",
        input.display(),
        prefix,
        config.image_format.extension(),
        width,
        height
    );
    let mut engine = DecodeEngine::new(decoder);
    let mut converter = Converter::new(config.image_format.pixel_format(), size, config.scale);

    let mut files = Vec::new();
    let mut write_frame = |frame: RawVideoFrame| -> Result<()> {
        let path = image_path(prefix, files.len() + 1, config.image_format.extension());
        let needs_conversion = frame.format() != converter.format()
            || size.is_some_and(|s| s != (frame.width(), frame.height()));
        if needs_conversion {
            write_image(converter.run(&frame)?, config.image_format, &path)?;
        } else {
            write_image(&frame, config.image_format, &path)?;
        }
        log::debug!("frame {:?} -> {}", frame.pts(), path.display());
        files.push(path);
        Ok(())
    };

    while let Some(packet) = source.read_packet()? {
        if registry.lookup(SOURCE, packet.index()) != Some(selected) {
            continue;
        }
        engine.submit(Some(packet))?;
        engine.drain(&mut write_frame)?;
    }
    engine.flush(&mut write_frame)?;

    log::info!("wrote {} image(s)", files.len());
    Ok(DecodeReport {
        files,
        width,
        height,
    })
}
