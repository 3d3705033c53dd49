use ffmpeg_next::Rational;

use crate::{
    engine::{DrainCursor, Drained, EngineState},
    error::{Error, Result},
    frame::RawVideoFrame,
    packet::RawPacket,
    stream::AvStream,
};

/// Codec side of the decode engine.
pub trait PacketDecoder {
    type Frame;

    fn send_packet(&mut self, packet: &RawPacket) -> Result<()>;
    fn send_eof(&mut self) -> Result<()>;
    fn receive_frame(&mut self) -> Result<Drained<Self::Frame>>;
}

/// FFmpeg video decoder.
pub struct VideoDecoder {
    inner: ffmpeg_next::codec::decoder::Video,
    time_base: Rational,
}

impl VideoDecoder {
    /// Opens the decoder for `stream`'s codec. `codec_name` picks a specific
    /// decoder implementation for that codec id (e.g. "h264_cuvid").
    pub fn from_stream(stream: &AvStream, codec_name: Option<&str>) -> Result<Self> {
        let forced = match codec_name {
            Some(name) => Some(
                ffmpeg_next::decoder::find_by_name(name)
                    .ok_or_else(|| Error::Config(format!("decoder not found: {}", name)))?,
            ),
            None => None,
        };

        let mut decoder_ctx = ffmpeg_next::codec::Context::new();
        unsafe {
            (*decoder_ctx.as_mut_ptr()).time_base = stream.time_base().into();
            (*decoder_ctx.as_mut_ptr()).pkt_timebase = stream.time_base().into();
        }
        decoder_ctx.set_parameters(stream.parameters().clone())?;

        let video_decoder = match forced {
            Some(codec) => decoder_ctx.decoder().open_as(codec)?.video()?,
            None => decoder_ctx.decoder().video()?,
        };
        if video_decoder.format() == ffmpeg_next::format::Pixel::None
            || video_decoder.width() == 0
            || video_decoder.height() == 0
        {
            return Err(Error::Decode(format!(
                "missing codec parameters for stream {}",
                stream.index()
            )));
        }

        log::debug!(
            "opened decoder {:?} {}x{} {:?} for stream {}",
            stream.codec_id(),
            video_decoder.width(),
            video_decoder.height(),
            video_decoder.format(),
            stream.index()
        );

        Ok(Self {
            inner: video_decoder,
            time_base: stream.time_base(),
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

    pub fn format(&self) -> ffmpeg_next::format::Pixel {
        self.inner.format()
    }
}

impl PacketDecoder for VideoDecoder {
    type Frame = RawVideoFrame;

    fn send_packet(&mut self, packet: &RawPacket) -> Result<()> {
        let send = |packet: &ffmpeg_next::codec::packet::Packet,
                    decoder: &mut ffmpeg_next::codec::decoder::Video| {
            decoder
                .send_packet(packet)
                .map_err(|e| Error::Decode(format!("send packet: {}", e)))
        };
        if packet.time_base() == self.time_base {
            send(packet.packet(), &mut self.inner)
        } else {
            let mut rescaled = packet.packet().clone();
            rescaled.set_pts(crate::time::rescale_ts(
                packet.pts(),
                packet.time_base(),
                self.time_base,
            ));
            rescaled.set_dts(crate::time::rescale_ts(
                packet.dts(),
                packet.time_base(),
                self.time_base,
            ));
            send(&rescaled, &mut self.inner)
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        self.inner
            .send_eof()
            .map_err(|e| Error::Decode(format!("send eof: {}", e)))
    }

    fn receive_frame(&mut self) -> Result<Drained<RawVideoFrame>> {
        let mut frame = ffmpeg_next::frame::Video::empty();
        match self.inner.receive_frame(&mut frame) {
            Ok(()) => Ok(Drained::Item(RawVideoFrame::from(frame))),
            Err(ffmpeg_next::Error::Eof) => Ok(Drained::Exhausted),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(Drained::WouldBlock)
            }
            Err(err) => Err(Error::Decode(format!("receive frame: {}", err))),
        }
    }
}

/// Drives a [`PacketDecoder`] through submit/drain cycles.
pub struct DecodeEngine<D: PacketDecoder> {
    decoder: D,
    cursor: DrainCursor,
    sequence: i64,
    last_pts: Option<i64>,
    frames: u64,
}

impl<D: PacketDecoder> DecodeEngine<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            cursor: DrainCursor::new("decoder"),
            sequence: 0,
            last_pts: None,
            frames: 0,
        }
    }

    /// Feeds one packet, or the end-of-stream marker when `None`.
    ///
    /// A packet without pts is stamped with its 0-based position among the
    /// submitted packets, raised past the last pts seen so stamped values
    /// never go backwards (dts too, when also unknown).
    pub fn submit(&mut self, packet: Option<RawPacket>) -> Result<()> {
        self.cursor.check_submit()?;
        match packet {
            Some(mut packet) => {
                if packet.pts().is_none() {
                    let synthetic = match self.last_pts {
                        Some(last) => self.sequence.max(last.saturating_add(1)),
                        None => self.sequence,
                    };
                    log::debug!("packet {} has no pts, using {}", self.sequence, synthetic);
                    packet.set_pts(Some(synthetic));
                    if packet.dts().is_none() {
                        packet.set_dts(Some(synthetic));
                    }
                }
                self.last_pts = packet.pts();
                self.sequence += 1;
                self.decoder.send_packet(&packet)?;
                self.cursor.submitted(false);
            }
            None => {
                self.decoder.send_eof()?;
                self.cursor.submitted(true);
            }
        }
        Ok(())
    }

    pub fn receive(&mut self) -> Result<Drained<D::Frame>> {
        if let Some(settled) = self.cursor.settled() {
            return Ok(settled);
        }
        let outcome = self.decoder.receive_frame()?;
        self.cursor.received(&outcome)?;
        if outcome.is_item() {
            self.frames += 1;
        }
        Ok(outcome)
    }

    /// Receives until the decoder blocks or is exhausted, handing every
    /// frame to `on_frame`. Returns the number of frames produced.
    pub fn drain<F>(&mut self, mut on_frame: F) -> Result<usize>
    where
        F: FnMut(D::Frame) -> Result<()>,
    {
        let mut count = 0;
        loop {
            match self.receive()? {
                Drained::Item(frame) => {
                    count += 1;
                    on_frame(frame)?;
                }
                Drained::WouldBlock | Drained::Exhausted => return Ok(count),
            }
        }
    }

    /// Submits the end-of-stream marker and drains what the decoder held back.
    pub fn flush<F>(&mut self, on_frame: F) -> Result<usize>
    where
        F: FnMut(D::Frame) -> Result<()>,
    {
        self.submit(None)?;
        self.drain(on_frame)
    }

    pub fn state(&self) -> EngineState {
        self.cursor.state()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.state() == EngineState::Finished
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }
}

#[cfg(test)]
#[path = "decoder_test.rs"]
mod decoder_test;
