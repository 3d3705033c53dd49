use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;
use serde::Serialize;

use crate::{
    config::EncodeConfig,
    encoder::{EncodeEngine, VideoEncoder},
    error::{Error, Result},
    frame::RawVideoFrame,
    image::read_image,
    output::MuxSink,
    packet::RawPacket,
    scaler::Converter,
    stream::AvStream,
};

#[derive(Debug, Clone, Serialize)]
pub struct EncodeReport {
    pub output: PathBuf,
    pub codec: String,
    pub frames: u64,
    pub packets: u64,
    /// pts of the last submitted frame, in the encoder time base.
    pub last_pts: Option<i64>,
    /// Files that could not be decoded as images.
    pub skipped: Vec<PathBuf>,
}

/// Regular files directly inside `folder`, in lexicographic order.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).map_err(|e| Error::io(folder, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(folder, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Encoder, converter and sink of one run, created once the first image
/// was read so that a folder without images leaves nothing behind.
struct Encoding {
    engine: EncodeEngine<VideoEncoder>,
    converter: Converter,
    sink: MuxSink,
    time_base: Rational,
    frame_duration: i64,
    last_pts: Option<i64>,
}

impl Encoding {
    fn start(output: &Path, config: &EncodeConfig) -> Result<Self> {
        let settings = &config.settings;
        let mut sink = MuxSink::create(output, config.format.as_deref())?;
        let encoder = VideoEncoder::new(settings, sink.requires_global_header())?;
        let stream = AvStream::from_encoder(
            0,
            encoder.context(),
            encoder.time_base(),
            settings.frame_rate(),
        );
        let index = sink.add_stream(&stream)?;
        sink.write_header()?;
        let time_base = sink
            .time_base(index)
            .ok_or_else(|| Error::Mux(format!("no output stream {}", index)))?;

        Ok(Self {
            engine: EncodeEngine::new(encoder),
            converter: Converter::new(
                settings.pixel_format,
                Some((settings.width, settings.height)),
                config.scale,
            ),
            sink,
            time_base,
            frame_duration: settings.frame_duration,
            last_pts: None,
        })
    }

    /// Converts `image` to the encoder geometry and submits it as frame `k`.
    fn push(&mut self, image: &RawVideoFrame) -> Result<()> {
        let k = self.engine.frames_submitted() as i64;
        let pts = k * self.frame_duration;

        let frame = self.converter.run(image)?;
        frame.set_pts(Some(pts));
        frame.set_duration(self.frame_duration);
        self.engine.submit(Some(&*frame))?;
        self.last_pts = Some(pts);

        let (sink, time_base) = (&mut self.sink, self.time_base);
        self.engine
            .drain(|packet| write_packet(sink, time_base, packet))?;
        Ok(())
    }

    fn finish(mut self, output: &Path, skipped: Vec<PathBuf>) -> Result<EncodeReport> {
        let (sink, time_base) = (&mut self.sink, self.time_base);
        self.engine
            .flush(|packet| write_packet(sink, time_base, packet))?;
        self.sink.close()?;

        Ok(EncodeReport {
            output: output.to_path_buf(),
            codec: self.engine.encoder().codec_name().to_string(),
            frames: self.engine.frames_submitted(),
            packets: self.sink.packets_written(0),
            last_pts: self.last_pts,
            skipped,
        })
    }
}

fn write_packet(sink: &mut MuxSink, time_base: Rational, mut packet: RawPacket) -> Result<()> {
    packet.rescale(time_base);
    sink.write(0, packet)
}

/// Encodes every readable image of `folder`, in file name order, into a
/// single video stream in `output`.
///
/// Frame `k` gets pts `k * frame_duration`. Files that cannot be decoded
/// are skipped with a warning.
pub fn images_to_encode(folder: &Path, output: &Path, config: &EncodeConfig) -> Result<EncodeReport> {
    config.settings.validate()?;
    let files = list_images(folder)?;
    log::info!(
        "encoding {} file(s) from {} into {}",
        files.len(),
        folder.display(),
        output.display()
    );

    let mut encoding: Option<Encoding> = None;
    let mut skipped = Vec::new();
    for path in files {
        let image = match read_image(&path) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                skipped.push(path);
                continue;
            }
        };
        if encoding.is_none() {
            encoding = Some(Encoding::start(output, config)?);
        }
        if let Some(encoding) = encoding.as_mut() {
            log::debug!("image {} {}x{}", path.display(), image.width(), image.height());
            encoding.push(&image)?;
        }
    }

    match encoding {
        Some(encoding) => {
            let report = encoding.finish(output, skipped)?;
            log::info!(
                "{}: {} frame(s), {} packet(s), last pts {:?}",
                output.display(),
                report.frames,
                report.packets,
                report.last_pts
            );
            Ok(report)
        }
        None => Err(Error::Config(format!(
            "no readable images in {}",
            folder.display()
        ))),
    }
}
