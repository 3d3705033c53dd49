use std::fmt;

use ffmpeg_next::{Rational, codec::Parameters, format::stream};
use serde::Serialize;

/// Media kind of a logical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

impl From<ffmpeg_next::media::Type> for MediaKind {
    fn from(medium: ffmpeg_next::media::Type) -> Self {
        match medium {
            ffmpeg_next::media::Type::Video => MediaKind::Video,
            ffmpeg_next::media::Type::Audio => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// Descriptor of one logical stream: codec parameters plus timing.
///
/// `Clone` deep-copies the codec parameters (`avcodec_parameters_copy`).
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn new(index: usize, parameters: Parameters, time_base: Rational, rate: Rational) -> Self {
        Self {
            index,
            parameters,
            time_base,
            rate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from(self.parameters.medium())
    }

    pub fn is_video(&self) -> bool {
        self.kind() == MediaKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind() == MediaKind::Audio
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        self.parameters.id()
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).height.max(0) as u32
        }
    }

    /// Copy of this descriptor renumbered to `index`.
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }

    /// Descriptor for the stream an opened encoder feeds: parameters come
    /// from the encoder context, timing from its time base and frame rate.
    pub fn from_encoder(
        index: usize,
        encoder: &ffmpeg_next::codec::encoder::video::Encoder,
        time_base: Rational,
        rate: Rational,
    ) -> Self {
        Self {
            index,
            parameters: Parameters::from(encoder),
            time_base,
            rate,
        }
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}

impl fmt::Debug for AvStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvStream")
            .field("index", &self.index)
            .field("kind", &self.kind())
            .field("codec", &self.codec_id())
            .field("time_base", &self.time_base)
            .field("rate", &self.rate)
            .finish()
    }
}

/// Hand-built descriptors for tests that never open a container.
#[cfg(test)]
pub(crate) fn test_stream(
    index: usize,
    medium: ffmpeg_next::media::Type,
    codec: ffmpeg_next::codec::Id,
    time_base: Rational,
) -> AvStream {
    let mut parameters = Parameters::new();
    unsafe {
        let ptr = parameters.as_mut_ptr();
        (*ptr).codec_type = medium.into();
        (*ptr).codec_id = codec.into();
        if medium == ffmpeg_next::media::Type::Video {
            (*ptr).width = 64;
            (*ptr).height = 48;
        }
    }
    AvStream::new(index, parameters, time_base, Rational::new(25, 1))
}
