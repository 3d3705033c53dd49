//! Per-flow settings. Every struct has a `Default` and round-trips through
//! serde so runs can be described as JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    encoder::EncoderSettings,
    error::{Error, Result},
    image::ImageFormat,
    scaler::ScaleAlgorithm,
};

/// Order in which the remux flow writes packets of its two sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterleaveMode {
    /// Every packet of the video source, then every packet of the audio source.
    #[default]
    Sequential,
    /// Merge both sources by dts (pts when dts is unknown).
    Timestamp,
}

impl FromStr for InterleaveMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(InterleaveMode::Sequential),
            "timestamp" => Ok(InterleaveMode::Timestamp),
            other => Err(Error::Config(format!("unknown interleave mode: {}", other))),
        }
    }
}

impl fmt::Display for InterleaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterleaveMode::Sequential => write!(f, "sequential"),
            InterleaveMode::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemuxConfig {
    pub interleave: InterleaveMode,
    /// Muxer name; guessed from the output extension when unset.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub image_format: ImageFormat,
    /// Output size; the clip's own size when unset.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: ScaleAlgorithm,
    /// Decoder implementation to force, e.g. "h264_cuvid".
    pub decoder: Option<String>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::default(),
            width: None,
            height: None,
            scale: ScaleAlgorithm::Bicubic,
            decoder: None,
        }
    }
}

impl DecodeConfig {
    /// Target size for the converter; both dimensions or neither.
    pub fn size(&self) -> Result<Option<(u32, u32)>> {
        match (self.width, self.height) {
            (None, None) => Ok(None),
            (Some(w), Some(h)) if w > 0 && h > 0 => Ok(Some((w, h))),
            (w, h) => Err(Error::Config(format!(
                "output size needs both width and height, got {:?}x{:?}",
                w, h
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub settings: EncoderSettings,
    /// Muxer name; guessed from the output extension when unset.
    pub format: Option<String>,
    pub scale: ScaleAlgorithm,
}

/// Serializes a pixel format by its FFmpeg name ("yuv420p").
pub(crate) mod pixel_serde {
    use ffmpeg_next::format::Pixel;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::frame::{parse_pixel, pixel_name};

    pub fn serialize<S: Serializer>(format: &Pixel, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(pixel_name(*format))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pixel, D::Error> {
        let name = String::deserialize(deserializer)?;
        parse_pixel(&name).map_err(serde::de::Error::custom)
    }
}
