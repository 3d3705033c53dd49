//! Still-image reading and writing at the edges of the image flows.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use ffmpeg_next::format::Pixel;
use serde::{Deserialize, Serialize};

use crate::{
    decoder::{DecodeEngine, VideoDecoder},
    error::{Error, Result},
    frame::{RawVideoFrame, pixel_name},
    input::AvInput,
};

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Binary graymap, luma only.
    Pgm,
    /// Binary pixmap, packed RGB.
    #[default]
    Ppm,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Pgm => "pgm",
            ImageFormat::Ppm => "ppm",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Pixel format frames must be converted to before writing.
    pub fn pixel_format(&self) -> Pixel {
        match self {
            ImageFormat::Pgm => Pixel::GRAY8,
            ImageFormat::Ppm | ImageFormat::Jpeg => Pixel::RGB24,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pgm" => Ok(ImageFormat::Pgm),
            "ppm" => Ok(ImageFormat::Ppm),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(Error::Config(format!("unknown image format: {}", other))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Pgm => write!(f, "pgm"),
            ImageFormat::Ppm => write!(f, "ppm"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

fn expect_format(frame: &RawVideoFrame, format: ImageFormat) -> Result<()> {
    if frame.format() != format.pixel_format() {
        return Err(Error::Config(format!(
            "{} needs {} frames, got {}",
            format,
            pixel_name(format.pixel_format()),
            pixel_name(frame.format())
        )));
    }
    Ok(())
}

/// Writes `frame` as binary PGM (`P5`) or PPM (`P6`): a text header with
/// width, height and max value 255, then the rows without stride padding.
pub fn encode_netpbm<W: Write>(
    frame: &RawVideoFrame,
    format: ImageFormat,
    mut out: W,
) -> std::io::Result<()> {
    let magic = match format {
        ImageFormat::Pgm => "P5",
        _ => "P6",
    };
    write!(out, "{}\n{} {}\n255\n", magic, frame.width(), frame.height())?;
    out.write_all(&frame.packed_plane(0))?;
    out.flush()
}

/// Writes `frame` to `path` in `format`. The frame must already be in
/// [`ImageFormat::pixel_format`].
pub fn write_image(frame: &RawVideoFrame, format: ImageFormat, path: &Path) -> Result<()> {
    expect_format(frame, format)?;
    match format {
        ImageFormat::Pgm | ImageFormat::Ppm => {
            let file = File::create(path).map_err(|e| Error::io(path, e))?;
            encode_netpbm(frame, format, BufWriter::new(file)).map_err(|e| Error::io(path, e))
        }
        ImageFormat::Jpeg => {
            let (width, height) = match (u16::try_from(frame.width()), u16::try_from(frame.height())) {
                (Ok(w), Ok(h)) => (w, h),
                _ => {
                    return Err(Error::Config(format!(
                        "{}x{} too large for jpeg",
                        frame.width(),
                        frame.height()
                    )));
                }
            };
            let encoder = jpeg_encoder::Encoder::new_file(path, JPEG_QUALITY)
                .map_err(|e| Error::Encode(format!("jpeg {}: {}", path.display(), e)))?;
            encoder
                .encode(&frame.packed_plane(0), width, height, jpeg_encoder::ColorType::Rgb)
                .map_err(|e| Error::Encode(format!("jpeg {}: {}", path.display(), e)))
        }
    }
}

/// Decodes the first picture of an image file with FFmpeg's image demuxers.
pub fn read_image(path: &Path) -> Result<RawVideoFrame> {
    let mut input = AvInput::open(path)?;
    let Some(stream) = input.streams().iter().find(|s| s.is_video()).cloned() else {
        return Err(Error::NoMatchingStream {
            kind: "video",
            source_id: 0,
        });
    };
    let mut engine = DecodeEngine::new(VideoDecoder::from_stream(&stream, None)?);

    let mut picture = None;
    let mut keep_first = |frame: RawVideoFrame| -> Result<()> {
        if picture.is_none() {
            picture = Some(frame);
        }
        Ok(())
    };
    while let Some(packet) = input.read_packet()? {
        if packet.index() != stream.index() {
            continue;
        }
        engine.submit(Some(packet))?;
        engine.drain(&mut keep_first)?;
    }
    engine.flush(&mut keep_first)?;

    picture.ok_or_else(|| Error::Decode(format!("{}: no picture decoded", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(format: Pixel, width: u32, height: u32) -> RawVideoFrame {
        let mut frame = RawVideoFrame::new(format, width, height);
        let stride = frame.stride(0);
        let row_bytes = frame.row_bytes(0);
        let data = frame.data_mut(0);
        for y in 0..height as usize {
            for x in 0..row_bytes {
                data[y * stride + x] = ((x + y) % 256) as u8;
            }
        }
        frame
    }

    #[test]
    fn test_ppm_header_and_rows() -> anyhow::Result<()> {
        let frame = gradient(Pixel::RGB24, 5, 3);
        let mut out = Vec::new();
        encode_netpbm(&frame, ImageFormat::Ppm, &mut out)?;

        let header = b"P6\n5 3\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(out.len(), header.len() + 5 * 3 * 3);
        // first byte of the second row
        assert_eq!(out[header.len() + 15], 1);
        Ok(())
    }

    #[test]
    fn test_pgm_header() -> anyhow::Result<()> {
        let frame = gradient(Pixel::GRAY8, 7, 2);
        let mut out = Vec::new();
        encode_netpbm(&frame, ImageFormat::Pgm, &mut out)?;
        assert!(out.starts_with(b"P5\n7 2\n255\n"));
        assert_eq!(out.len(), 11 + 14);
        Ok(())
    }

    #[test]
    fn test_wrong_pixel_format_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let frame = gradient(Pixel::GRAY8, 4, 4);
        let err = write_image(&frame, ImageFormat::Ppm, &dir.path().join("a.ppm")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        Ok(())
    }

    #[test]
    fn test_ppm_and_jpeg_read_back() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let frame = gradient(Pixel::RGB24, 24, 16);

        for format in [ImageFormat::Ppm, ImageFormat::Jpeg] {
            let path = dir.path().join(format!("frame.{}", format.extension()));
            write_image(&frame, format, &path)?;
            let decoded = read_image(&path)?;
            assert_eq!((decoded.width(), decoded.height()), (24, 16), "{}", format);
        }
        Ok(())
    }

    #[test]
    fn test_unreadable_image() -> anyhow::Result<()> {
        crate::init()?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.ppm");
        std::fs::write(&path, b"")?;
        assert!(read_image(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_format_names() {
        assert_eq!("PGM".parse::<ImageFormat>().unwrap(), ImageFormat::Pgm);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("gif".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::default().extension(), "ppm");
    }
}
