use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::Dictionary;

use crate::{
    error::{Error, Result},
    packet::RawPacket,
    stream::AvStream,
};

/// Demuxing side of a pipeline: one opened input container.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: Vec<AvStream>,
    url: String,
}

impl AvInput {
    /// Resolve input format by name (e.g. "lavfi", "image2") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| Error::Config(format!("invalid format name {:?}: {}", name, e)))?;
        let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(Error::Config(format!("input format not found: {}", name)));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    /// Opens `url`, optionally forcing the demuxer and passing demuxer options.
    pub fn new(url: &str, format: Option<&str>, options: Option<Dictionary>) -> Result<Self> {
        use ffmpeg_next::format::format::Format;

        let path = Path::new(url);
        let opened = match format {
            Some(fmt_name) => {
                let fmt = Self::find_input_format(fmt_name)?;
                ffmpeg_next::format::open_with(
                    path,
                    &Format::Input(fmt),
                    options.unwrap_or_else(Dictionary::new),
                )
                .map(|ctx| ctx.input())
            }
            None => match options {
                Some(opts) => ffmpeg_next::format::input_with_dictionary(path, opts),
                None => ffmpeg_next::format::input(path),
            },
        };
        let input = opened.map_err(|e| demux_error(url, e))?;

        let mut streams: Vec<AvStream> = input.streams().map(AvStream::from).collect();
        streams.sort_by_key(|s| s.index());
        log::debug!("opened {} with {} stream(s)", url, streams.len());

        Ok(Self {
            inner: input,
            streams,
            url: url.to_string(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::new(&path.to_string_lossy(), None, None)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream descriptors in container order.
    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    /// Next packet in container order, tagged with its stream's time base.
    /// `Ok(None)` at end of input; any other demuxer failure is returned.
    pub fn read_packet(&mut self) -> Result<Option<RawPacket>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Eof) => return Ok(None),
            Err(e) => return Err(demux_error(&self.url, e)),
        }
        let time_base = self
            .inner
            .stream(packet.stream())
            .map(|stream| stream.time_base())
            .ok_or_else(|| {
                Error::Decode(format!(
                    "{}: packet for unknown stream {}",
                    self.url,
                    packet.stream()
                ))
            })?;
        Ok(Some((packet, time_base).into()))
    }

    pub(crate) fn context(&self) -> &ffmpeg_next::format::context::Input {
        &self.inner
    }
}

/// Plain errno failures (missing file, EIO) become [`Error::Io`].
fn demux_error(url: &str, err: ffmpeg_next::Error) -> Error {
    match err {
        ffmpeg_next::Error::Other { errno } => {
            Error::io(url, std::io::Error::from_raw_os_error(errno))
        }
        other => Error::Ffmpeg(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MediaKind;

    #[test]
    fn test_lavfi_testsrc_packets() -> anyhow::Result<()> {
        crate::init()?;
        let mut input = match AvInput::new("testsrc=size=64x48:rate=10:duration=1", Some("lavfi"), None) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("skip: lavfi not available: {}", e);
                return Ok(());
            }
        };
        assert_eq!(input.streams().len(), 1);
        assert_eq!(input.streams()[0].kind(), MediaKind::Video);
        assert_eq!((input.streams()[0].width(), input.streams()[0].height()), (64, 48));

        let mut count = 0;
        while let Some(packet) = input.read_packet()? {
            assert_eq!(packet.index(), 0);
            assert_eq!(packet.time_base(), input.streams()[0].time_base());
            count += 1;
        }
        assert_eq!(count, 10);
        assert!(input.read_packet()?.is_none());
        assert!(input.read_packet()?.is_none());
        Ok(())
    }

    const EIO: i32 = 5;

    #[test]
    fn test_demux_errors_are_classified() {
        let err = demux_error("clip.mkv", ffmpeg_next::Error::Other { errno: EIO });
        match err {
            Error::Io { path, source } => {
                assert_eq!(path, "clip.mkv");
                assert_eq!(source.raw_os_error(), Some(EIO));
            }
            other => panic!("expected an i/o error, got {:?}", other),
        }
        assert!(matches!(
            demux_error("clip.mkv", ffmpeg_next::Error::InvalidData),
            Error::Ffmpeg(ffmpeg_next::Error::InvalidData)
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        crate::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mkv");
        assert!(AvInput::open(&missing).is_err());
    }

    #[test]
    fn test_unknown_demuxer() {
        crate::init().unwrap();
        let err = AvInput::new("x", Some("no-such-demuxer"), None).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
