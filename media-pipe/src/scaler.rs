use ffmpeg_next::{format::Pixel, software::scaling};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    frame::{RawVideoFrame, pixel_name},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleAlgorithm {
    #[default]
    Bilinear,
    Bicubic,
}

impl From<ScaleAlgorithm> for scaling::Flags {
    fn from(algorithm: ScaleAlgorithm) -> Self {
        match algorithm {
            ScaleAlgorithm::Bilinear => scaling::Flags::BILINEAR,
            ScaleAlgorithm::Bicubic => scaling::Flags::BICUBIC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    format: Pixel,
    width: u32,
    height: u32,
}

impl Geometry {
    fn of(frame: &RawVideoFrame) -> Self {
        Self {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
        }
    }
}

/// Pixel format and resolution converter with a fixed target.
///
/// The scaling context is created on the first frame and kept until a frame
/// with a different source geometry arrives. The output frame is owned by
/// the converter and overwritten by every `run`.
pub struct Converter {
    format: Pixel,
    size: Option<(u32, u32)>,
    algorithm: ScaleAlgorithm,
    context: Option<(Geometry, scaling::Context)>,
    output: Option<RawVideoFrame>,
}

impl Converter {
    /// `size` of `None` keeps each source frame's resolution.
    pub fn new(format: Pixel, size: Option<(u32, u32)>, algorithm: ScaleAlgorithm) -> Self {
        Self {
            format,
            size,
            algorithm,
            context: None,
            output: None,
        }
    }

    pub fn format(&self) -> Pixel {
        self.format
    }

    fn target_for(&self, source: Geometry) -> Geometry {
        let (width, height) = self.size.unwrap_or((source.width, source.height));
        Geometry {
            format: self.format,
            width,
            height,
        }
    }

    fn ensure_context(&mut self, source: Geometry) -> Result<()> {
        if let Some((current, _)) = &self.context {
            if *current == source {
                return Ok(());
            }
            log::debug!(
                "source changed to {}x{} {}, rebuilding converter",
                source.width,
                source.height,
                pixel_name(source.format)
            );
        }

        let target = self.target_for(source);
        let context = scaling::Context::get(
            source.format,
            source.width,
            source.height,
            target.format,
            target.width,
            target.height,
            self.algorithm.into(),
        )
        .map_err(|e| {
            Error::Convert(format!(
                "{}x{} {} -> {}x{} {}: {}",
                source.width,
                source.height,
                pixel_name(source.format),
                target.width,
                target.height,
                pixel_name(target.format),
                e
            ))
        })?;
        self.context = Some((source, context));

        let reusable = self
            .output
            .as_ref()
            .is_some_and(|frame| Geometry::of(frame) == target);
        if !reusable {
            self.output = Some(RawVideoFrame::new(target.format, target.width, target.height));
        }
        Ok(())
    }

    /// Converts `frame`, carrying its pts and duration over to the result.
    pub fn run(&mut self, frame: &RawVideoFrame) -> Result<&mut RawVideoFrame> {
        self.ensure_context(Geometry::of(frame))?;
        let (Some((_, context)), Some(output)) = (self.context.as_mut(), self.output.as_mut())
        else {
            return Err(Error::Alloc("converter not initialised".to_string()));
        };

        // the previous result may still be referenced by an encoder
        let ret = unsafe { ffmpeg_next::ffi::av_frame_make_writable(output.get_mut().as_mut_ptr()) };
        if ret < 0 {
            return Err(Error::Alloc(format!(
                "make frame writable: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }

        context
            .run(frame.as_video(), output.get_mut())
            .map_err(|e| Error::Convert(e.to_string()))?;
        output.set_pts(frame.pts());
        output.set_duration(frame.duration());
        Ok(output)
    }
}
