use std::ffi::CString;

use bytes::{BufMut, Bytes, BytesMut};
use ffmpeg_next::format::Pixel;

use crate::error::{Error, Result};

/// A decoded picture. Planes, strides, pixel format, pts and duration all
/// live in the wrapped FFmpeg frame, so they reach the encoder unchanged.
/// The duration is in the time base of whoever stamped it; 0 is unknown.
pub struct RawVideoFrame {
    frame: ffmpeg_next::frame::Video,
}

impl From<ffmpeg_next::frame::Video> for RawVideoFrame {
    fn from(frame: ffmpeg_next::frame::Video) -> Self {
        Self { frame }
    }
}

impl RawVideoFrame {
    /// Allocates a frame with fresh plane buffers.
    pub fn new(format: Pixel, width: u32, height: u32) -> Self {
        Self::from(ffmpeg_next::frame::Video::new(format, width, height))
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.frame.set_pts(pts);
    }

    pub fn duration(&self) -> i64 {
        unsafe { (*self.frame.as_ptr()).duration }
    }

    pub fn set_duration(&mut self, duration: i64) {
        unsafe {
            (*self.frame.as_mut_ptr()).duration = duration;
        }
    }

    pub fn planes(&self) -> usize {
        self.frame.planes()
    }

    pub fn stride(&self, plane: usize) -> usize {
        self.frame.stride(plane)
    }

    pub fn data(&self, plane: usize) -> &[u8] {
        self.frame.data(plane)
    }

    pub fn data_mut(&mut self, plane: usize) -> &mut [u8] {
        self.frame.data_mut(plane)
    }

    /// Bytes of pixel data in one row of `plane`, without stride padding.
    pub fn row_bytes(&self, plane: usize) -> usize {
        let size = unsafe {
            ffmpeg_next::ffi::av_image_get_linesize(
                self.format().into(),
                self.width() as i32,
                plane as i32,
            )
        };
        size.max(0) as usize
    }

    /// Rows in `plane` (chroma planes of subsampled formats are shorter).
    pub fn plane_rows(&self, plane: usize) -> usize {
        self.frame.plane_height(plane) as usize
    }

    /// Copies `plane` out row by row, dropping stride padding.
    pub fn packed_plane(&self, plane: usize) -> Bytes {
        let row_bytes = self.row_bytes(plane);
        let stride = self.stride(plane);
        let rows = self.plane_rows(plane);
        let data = self.data(plane);

        let mut packed = BytesMut::with_capacity(row_bytes * rows);
        for row in 0..rows {
            let start = row * stride;
            packed.put_slice(&data[start..start + row_bytes]);
        }
        packed.freeze()
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::frame::Video {
        &mut self.frame
    }

    pub fn as_video(&self) -> &ffmpeg_next::frame::Video {
        &self.frame
    }
}

/// Looks up a pixel format by its FFmpeg name, e.g. "yuv420p".
pub fn parse_pixel(name: &str) -> Result<Pixel> {
    let cname =
        CString::new(name).map_err(|e| Error::Config(format!("pixel format {:?}: {}", name, e)))?;
    let format = Pixel::from(unsafe { ffmpeg_next::ffi::av_get_pix_fmt(cname.as_ptr()) });
    if format == Pixel::None {
        return Err(Error::Config(format!("unknown pixel format: {}", name)));
    }
    Ok(format)
}

/// FFmpeg name of a pixel format.
pub fn pixel_name(format: Pixel) -> &'static str {
    format.descriptor().map(|d| d.name()).unwrap_or("none")
}
