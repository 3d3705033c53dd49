use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;

use crate::{
    error::{Error, Result},
    packet::RawPacket,
    stream::AvStream,
};

/// Muxing side of a pipeline: one output container.
///
/// Streams are added first, then the header is written exactly once. Packets
/// must already be in the output stream's time base (see [`MuxSink::time_base`]);
/// the sink only renumbers them. The trailer is written by [`MuxSink::close`],
/// or on drop if the sink was never closed.
pub struct MuxSink {
    inner: ffmpeg_next::format::context::Output,
    path: PathBuf,
    streams: Vec<AvStream>,
    packets_written: Vec<u64>,
    have_written_header: bool,
    have_written_trailer: bool,
    closed: bool,
}

impl MuxSink {
    /// Creates the output file. The muxer is guessed from the extension
    /// unless `format` names one.
    pub fn create(path: impl AsRef<Path>, format: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let output = match format {
            Some(format) => ffmpeg_next::format::output_as(&path, format),
            None => ffmpeg_next::format::output(&path),
        }
        .map_err(|e| match e {
            ffmpeg_next::Error::Other { errno } => {
                Error::io(path, std::io::Error::from_raw_os_error(errno))
            }
            other => Error::Mux(format!("create {}: {}", path.display(), other)),
        })?;
        Ok(Self {
            inner: output,
            path: path.to_path_buf(),
            streams: Vec::new(),
            packets_written: Vec::new(),
            have_written_header: false,
            have_written_trailer: false,
            closed: false,
        })
    }

    /// Creates the output, adds one stream per descriptor in order and
    /// writes the header.
    pub fn open(path: impl AsRef<Path>, streams: &[AvStream], format: Option<&str>) -> Result<Self> {
        let mut sink = Self::create(path, format)?;
        for stream in streams {
            sink.add_stream(stream)?;
        }
        sink.write_header()?;
        Ok(sink)
    }

    /// Whether encoders feeding this container must emit global headers.
    pub fn requires_global_header(&self) -> bool {
        self.inner
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER)
    }

    /// Adds an output stream copying `stream`'s codec parameters and
    /// returns its output index.
    pub fn add_stream(&mut self, stream: &AvStream) -> Result<usize> {
        if self.have_written_header {
            return Err(Error::Usage(format!(
                "{}: stream added after header",
                self.path.display()
            )));
        }
        let codec_parameters = stream.parameters();
        let mut writer_stream = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(codec_parameters.id()))
            .map_err(|e| Error::Alloc(format!("output stream: {}", e)))?;
        writer_stream.set_parameters(codec_parameters.clone());
        writer_stream.set_time_base(stream.time_base());
        unsafe {
            // tags from the source container are not valid in every target
            (*writer_stream.parameters().as_mut_ptr()).codec_tag = 0;
        }

        let index = writer_stream.index();
        self.streams.push(stream.with_index(index));
        self.packets_written.push(0);
        Ok(index)
    }

    pub fn write_header(&mut self) -> Result<()> {
        if self.have_written_header {
            return Err(Error::Usage(format!(
                "{}: header already written",
                self.path.display()
            )));
        }
        if self.streams.is_empty() {
            return Err(Error::Config(format!(
                "{}: no output streams",
                self.path.display()
            )));
        }
        self.inner
            .write_header()
            .map_err(|e| Error::Mux(format!("write header {}: {}", self.path.display(), e)))?;
        self.have_written_header = true;

        for (index, stream) in self.streams.iter().enumerate() {
            let time_base = self.time_base(index).unwrap_or(stream.time_base());
            log::info!(
                "{}: output stream {} {} {:?} time base {}/{}",
                self.path.display(),
                index,
                stream.kind(),
                stream.codec_id(),
                time_base.numerator(),
                time_base.denominator()
            );
        }
        Ok(())
    }

    /// Time base of output stream `index`. The muxer may replace the
    /// requested one while writing the header.
    pub fn time_base(&self, index: usize) -> Option<Rational> {
        self.inner.stream(index).map(|stream| stream.time_base())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    pub fn packets_written(&self, index: usize) -> u64 {
        self.packets_written.get(index).copied().unwrap_or(0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn trailer_written(&self) -> bool {
        self.have_written_trailer
    }

    /// Writes `packet` to output stream `index`, interleaved by dts.
    pub fn write(&mut self, index: usize, mut packet: RawPacket) -> Result<()> {
        if !self.have_written_header {
            return Err(Error::Usage(format!(
                "{}: packet written before header",
                self.path.display()
            )));
        }
        if self.closed {
            return Err(Error::Usage(format!(
                "{}: packet written after trailer",
                self.path.display()
            )));
        }
        let Some(out_time_base) = self.time_base(index) else {
            return Err(Error::Usage(format!(
                "{}: no output stream {}",
                self.path.display(),
                index
            )));
        };
        if packet.time_base() != out_time_base {
            return Err(Error::Usage(format!(
                "{}: packet in time base {}/{} for stream {} in {}/{}",
                self.path.display(),
                packet.time_base().numerator(),
                packet.time_base().denominator(),
                index,
                out_time_base.numerator(),
                out_time_base.denominator()
            )));
        }

        packet.set_index(index);
        log::debug!(
            "write stream {} pts {:?} dts {:?} size {}",
            index,
            packet.pts(),
            packet.dts(),
            packet.size()
        );
        packet
            .packet()
            .write_interleaved(&mut self.inner)
            .map_err(|e| Error::Mux(format!("write packet to stream {}: {}", index, e)))?;
        self.packets_written[index] += 1;
        Ok(())
    }

    /// Writes the trailer. Calling it again is a no-op; a sink whose header
    /// was never written is closed without a trailer.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.have_written_header {
            self.inner
                .write_trailer()
                .map_err(|e| Error::Mux(format!("write trailer {}: {}", self.path.display(), e)))?;
            self.have_written_trailer = true;
            log::info!(
                "{}: closed, packets per stream {:?}",
                self.path.display(),
                self.packets_written
            );
        }
        Ok(())
    }
}

impl Drop for MuxSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::{codec, codec::packet::Packet, media};

    use super::*;
    use crate::stream::test_stream;

    fn video_stream() -> AvStream {
        test_stream(0, media::Type::Video, codec::Id::MPEG4, Rational::new(1, 25))
    }

    fn packet(pts: i64, time_base: Rational) -> RawPacket {
        let mut packet = Packet::copy(&[0, 0, 1, 0xb6, 0x10, 0x20]);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        packet.set_duration(40);
        RawPacket::new(packet, time_base)
    }

    #[test]
    fn test_header_packets_trailer() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.mkv");

        let mut sink = MuxSink::open(&path, &[video_stream()], None)?;
        assert_eq!(sink.stream_count(), 1);
        // matroska always stores milliseconds
        let time_base = sink.time_base(0).unwrap();
        assert_eq!(time_base, Rational::new(1, 1000));

        for k in 0..5 {
            sink.write(0, packet(k * 40, time_base))?;
        }
        assert_eq!(sink.packets_written(0), 5);
        assert!(!sink.trailer_written());
        sink.close()?;
        sink.close()?;
        assert!(sink.trailer_written());

        assert!(std::fs::metadata(&path)?.len() > 0);
        Ok(())
    }

    #[test]
    fn test_write_contract_violations() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;

        let mut sink = MuxSink::create(dir.path().join("early.mkv"), None)?;
        sink.add_stream(&video_stream())?;
        let err = sink.write(0, packet(0, Rational::new(1, 1000))).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        sink.write_header()?;
        assert!(matches!(sink.write_header(), Err(Error::Usage(_))));
        assert!(matches!(sink.add_stream(&video_stream()), Err(Error::Usage(_))));

        let err = sink.write(1, packet(0, Rational::new(1, 1000))).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        let err = sink.write(0, packet(0, Rational::new(1, 25))).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));

        sink.close()?;
        let err = sink.write(0, packet(0, Rational::new(1, 1000))).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        Ok(())
    }

    #[test]
    fn test_drop_without_header() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let sink = MuxSink::create(dir.path().join("never.mkv"), None)?;
        assert!(matches!(
            MuxSink::create(dir.path().join("x.mkv"), Some("no-such-muxer")),
            Err(_)
        ));
        drop(sink);
        Ok(())
    }

    #[test]
    fn test_no_streams_is_a_config_error() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let err = MuxSink::open(dir.path().join("empty.mkv"), &[], None).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        Ok(())
    }
}
