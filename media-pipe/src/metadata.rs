//! Container and stream summary of a media file, for the `probe` tool.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;
use serde::Serialize;

use crate::{
    error::Result,
    input::AvInput,
    stream::{AvStream, MediaKind},
};

#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    /// Demuxer name, e.g. "matroska,webm".
    pub container: String,
    pub duration_seconds: Option<f64>,
    /// Overall bit rate in bit/s, when the demuxer reports one.
    pub bit_rate: Option<i64>,
    pub tags: BTreeMap<String, String>,
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub codec: String,
    /// "num/den"
    pub time_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u32,
}

fn ratio(r: Rational) -> String {
    format!("{}/{}", r.numerator(), r.denominator())
}

fn write_tags(f: &mut fmt::Formatter<'_>, indent: &str, tags: &BTreeMap<String, String>) -> fmt::Result {
    for (key, value) in tags {
        writeln!(f, "{}{}: {}", indent, key, value)?;
    }
    Ok(())
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.index, self.kind, self.codec)?;
        if let Some(video) = self.video {
            write!(f, " {}x{}", video.width, video.height)?;
        }
        if let Some(audio) = self.audio {
            write!(f, " {} Hz {} ch", audio.sample_rate, audio.channels)?;
        }
        if let Some(rate) = &self.frame_rate {
            write!(f, ", {} fps", rate)?;
        }
        write!(f, ", time base {}", self.time_base)
    }
}

/// One header line for the container, then one line per stream, each
/// followed by its tags.
impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.container)?;
        match self.duration_seconds {
            Some(seconds) => write!(f, ", {:.3} s", seconds)?,
            None => write!(f, ", duration unknown")?,
        }
        if let Some(bit_rate) = self.bit_rate {
            write!(f, ", {} kb/s", bit_rate / 1000)?;
        }
        writeln!(f)?;
        write_tags(f, "  ", &self.tags)?;
        for stream in &self.streams {
            writeln!(f, "  {}", stream)?;
            write_tags(f, "    ", &stream.tags)?;
        }
        Ok(())
    }
}

fn known(value: i64) -> Option<i64> {
    (value != ffmpeg_next::ffi::AV_NOPTS_VALUE && value > 0).then_some(value)
}

fn tags(dict: ffmpeg_next::DictionaryRef<'_>) -> BTreeMap<String, String> {
    dict.iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn audio_info(stream: &AvStream) -> AudioInfo {
    let params = unsafe { &*stream.parameters().as_ptr() };
    AudioInfo {
        sample_rate: params.sample_rate.max(0) as u32,
        channels: params.ch_layout.nb_channels.max(0) as u32,
    }
}

fn stream_info(stream: ffmpeg_next::format::stream::Stream<'_>) -> StreamInfo {
    let duration_seconds = known(stream.duration())
        .map(|d| d as f64 * f64::from(stream.time_base()));
    let tags = tags(stream.metadata());
    let stream = AvStream::from(stream);
    let rate = stream.rate();

    StreamInfo {
        index: stream.index(),
        kind: stream.kind(),
        codec: stream.codec_id().name().to_string(),
        time_base: ratio(stream.time_base()),
        frame_rate: (stream.is_video() && rate.numerator() > 0).then(|| ratio(rate)),
        duration_seconds,
        video: stream.is_video().then(|| VideoInfo {
            width: stream.width(),
            height: stream.height(),
        }),
        audio: stream.is_audio().then(|| audio_info(&stream)),
        tags,
    }
}

/// Opens `path` and summarises its container and streams.
pub fn probe(path: &Path) -> Result<MediaInfo> {
    let input = AvInput::open(path)?;
    let ctx = input.context();

    let mut streams: Vec<StreamInfo> = ctx.streams().map(stream_info).collect();
    streams.sort_by_key(|s| s.index);

    Ok(MediaInfo {
        path: path.to_path_buf(),
        container: ctx.format().name().to_string(),
        duration_seconds: known(ctx.duration())
            .map(|d| d as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64),
        bit_rate: (ctx.bit_rate() > 0).then(|| ctx.bit_rate()),
        tags: tags(ctx.metadata()),
        streams,
    })
}
