use std::collections::HashMap;

use ffmpeg_next::{Dictionary, Rational, format::Pixel};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{DrainCursor, Drained, EngineState},
    error::{Error, Result},
    frame::{RawVideoFrame, pixel_name},
    packet::RawPacket,
};

/// Encoder used when the configured one is not compiled into FFmpeg.
const FALLBACK_CODEC: ffmpeg_next::codec::Id = ffmpeg_next::codec::Id::MPEG4;

/// Codec side of the encode engine.
pub trait FrameEncoder {
    type Frame;

    fn send_frame(&mut self, frame: &Self::Frame) -> Result<()>;
    fn send_eof(&mut self) -> Result<()>;
    fn receive_packet(&mut self) -> Result<Drained<RawPacket>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Ticks per frame; the encoder time base is 1/(fps * frame_duration).
    pub frame_duration: i64,
    #[serde(with = "crate::config::pixel_serde")]
    pub pixel_format: Pixel,
    pub codec: String,
    /// GOP size; 0 keeps the encoder's default.
    pub keyframe_interval: u32,
    /// Private codec options, e.g. ("preset", "fast").
    pub options: Vec<(String, String)>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            frame_duration: 1001,
            pixel_format: Pixel::YUV420P,
            codec: "libx264".to_string(),
            keyframe_interval: 0,
            options: Vec::new(),
        }
    }
}

impl EncoderSettings {
    pub fn time_base(&self) -> Rational {
        Rational::new(1, self.fps as i32 * self.frame_duration as i32)
    }

    pub fn frame_rate(&self) -> Rational {
        Rational::new(self.fps as i32, 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "invalid video size {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 || self.frame_duration <= 0 {
            return Err(Error::Config(format!(
                "invalid timing: {} fps, frame duration {}",
                self.fps, self.frame_duration
            )));
        }
        if (self.fps as i64).saturating_mul(self.frame_duration) > i32::MAX as i64 {
            return Err(Error::Config(format!(
                "time base 1/({} * {}) out of range",
                self.fps, self.frame_duration
            )));
        }
        if self.pixel_format == Pixel::None {
            return Err(Error::Config("pixel format not set".to_string()));
        }
        Ok(())
    }
}

/// FFmpeg video encoder opened with fixed geometry and format.
pub struct VideoEncoder {
    inner: ffmpeg_next::codec::encoder::video::Encoder,
    time_base: Rational,
    frame_duration: i64,
    /// Durations of submitted frames keyed by pts, for encoders that
    /// leave packet durations unset.
    pending: HashMap<i64, i64>,
    codec_name: String,
}

impl VideoEncoder {
    /// Opens the encoder named in `settings`, falling back to MPEG-4 Part 2
    /// when that name is unknown. `global_header` must be set when the
    /// target container stores codec extradata in its header.
    pub fn new(settings: &EncoderSettings, global_header: bool) -> Result<Self> {
        settings.validate()?;

        let codec = match ffmpeg_next::encoder::find_by_name(&settings.codec) {
            Some(codec) => codec,
            None => {
                log::warn!(
                    "encoder {} not available, falling back to {:?}",
                    settings.codec,
                    FALLBACK_CODEC
                );
                ffmpeg_next::encoder::find(FALLBACK_CODEC)
                    .ok_or_else(|| Error::Config(format!("codec not found: {}", settings.codec)))?
            }
        };
        let codec_name = codec.name().to_string();

        let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(settings.pixel_format);
        encoder.set_time_base(settings.time_base());
        encoder.set_frame_rate(Some(settings.frame_rate()));
        if settings.keyframe_interval > 0 {
            encoder.set_gop(settings.keyframe_interval);
        }
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        for (key, value) in &settings.options {
            opts.set(key, value);
        }
        let encoder = encoder
            .open_with(opts)
            .map_err(|e| Error::Encode(format!("open {}: {}", codec_name, e)))?;

        let time_base: Rational = unsafe { (*encoder.as_ptr()).time_base.into() };
        log::info!(
            "encoder {} opened: {}x{} {} time base {}/{}",
            codec_name,
            settings.width,
            settings.height,
            pixel_name(settings.pixel_format),
            time_base.numerator(),
            time_base.denominator()
        );

        Ok(Self {
            inner: encoder,
            time_base,
            frame_duration: settings.frame_duration,
            pending: HashMap::new(),
            codec_name,
        })
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn format(&self) -> Pixel {
        self.inner.format()
    }

    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    pub fn context(&self) -> &ffmpeg_next::codec::encoder::video::Encoder {
        &self.inner
    }
}

impl FrameEncoder for VideoEncoder {
    type Frame = RawVideoFrame;

    fn send_frame(&mut self, frame: &RawVideoFrame) -> Result<()> {
        if frame.width() != self.width()
            || frame.height() != self.height()
            || frame.format() != self.format()
        {
            return Err(Error::Encode(format!(
                "frame {}x{} {} does not match encoder {}x{} {}",
                frame.width(),
                frame.height(),
                pixel_name(frame.format()),
                self.width(),
                self.height(),
                pixel_name(self.format())
            )));
        }
        self.inner
            .send_frame(frame.as_video())
            .map_err(|e| Error::Encode(format!("send frame: {}", e)))?;
        if let Some(pts) = frame.pts() {
            if frame.duration() > 0 {
                self.pending.insert(pts, frame.duration());
            }
        }
        Ok(())
    }

    fn send_eof(&mut self) -> Result<()> {
        self.inner
            .send_eof()
            .map_err(|e| Error::Encode(format!("send eof: {}", e)))
    }

    fn receive_packet(&mut self) -> Result<Drained<RawPacket>> {
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => {
                let submitted = packet.pts().and_then(|pts| self.pending.remove(&pts));
                if packet.duration() == 0 {
                    packet.set_duration(submitted.unwrap_or(self.frame_duration));
                }
                Ok(Drained::Item(RawPacket::new(packet, self.time_base)))
            }
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(Drained::WouldBlock)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(Drained::Exhausted),
            Err(err) => Err(Error::Encode(format!("receive packet: {}", err))),
        }
    }
}

/// Drives a [`FrameEncoder`] through submit/drain cycles.
///
/// Frames must arrive with their pts already assigned; produced packets
/// are in the encoder's time base and need rescaling before muxing.
pub struct EncodeEngine<E: FrameEncoder> {
    encoder: E,
    cursor: DrainCursor,
    frames: u64,
    packets: u64,
}

impl<E: FrameEncoder> EncodeEngine<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            cursor: DrainCursor::new("encoder"),
            frames: 0,
            packets: 0,
        }
    }

    /// Feeds one frame, or the end-of-stream marker when `None`.
    pub fn submit(&mut self, frame: Option<&E::Frame>) -> Result<()> {
        self.cursor.check_submit()?;
        match frame {
            Some(frame) => {
                self.encoder.send_frame(frame)?;
                self.frames += 1;
                self.cursor.submitted(false);
            }
            None => {
                self.encoder.send_eof()?;
                self.cursor.submitted(true);
            }
        }
        Ok(())
    }

    pub fn receive(&mut self) -> Result<Drained<RawPacket>> {
        if let Some(settled) = self.cursor.settled() {
            return Ok(settled);
        }
        let outcome = self.encoder.receive_packet()?;
        self.cursor.received(&outcome)?;
        if outcome.is_item() {
            self.packets += 1;
        }
        Ok(outcome)
    }

    /// Receives until the encoder blocks or is exhausted, handing every
    /// packet to `on_packet`. Returns the number of packets produced.
    pub fn drain<F>(&mut self, mut on_packet: F) -> Result<usize>
    where
        F: FnMut(RawPacket) -> Result<()>,
    {
        let mut count = 0;
        loop {
            match self.receive()? {
                Drained::Item(packet) => {
                    count += 1;
                    on_packet(packet)?;
                }
                Drained::WouldBlock | Drained::Exhausted => return Ok(count),
            }
        }
    }

    /// Submits the end-of-stream marker and drains buffered packets.
    pub fn flush<F>(&mut self, on_packet: F) -> Result<usize>
    where
        F: FnMut(RawPacket) -> Result<()>,
    {
        self.submit(None)?;
        self.drain(on_packet)
    }

    pub fn state(&self) -> EngineState {
        self.cursor.state()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.state() == EngineState::Finished
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames
    }

    pub fn packets_received(&self) -> u64 {
        self.packets
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
mod encoder_test;
