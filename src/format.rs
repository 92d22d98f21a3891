use std::fmt;

use crate::v4l2::videodev::{v4l2_pix_format, V4L2_FIELD_NONE};
use crate::FourCC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Streaming format (single-planar)
pub struct PixFormat {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixelformat code
    pub fourcc: FourCC,
    /// Bytes per line
    pub stride: u32,
    /// Maximum number of bytes required to store an image
    pub size: u32,
}

impl PixFormat {
    /// Returns a packed YUYV format description for the given geometry
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    ///
    /// # Example
    ///
    /// ```
    /// use yuvloop::PixFormat;
    /// let fmt = PixFormat::yuyv(640, 480);
    /// assert_eq!(fmt.size, 640 * 480 * 2);
    /// ```
    pub const fn yuyv(width: u32, height: u32) -> Self {
        // YUYV packs two pixels into four bytes
        let stride = width * 2;
        PixFormat {
            width,
            height,
            fourcc: FourCC::YUYV,
            stride,
            size: stride * height,
        }
    }
}

impl fmt::Display for PixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} (stride {}, {} bytes)",
            self.width, self.height, self.fourcc, self.stride, self.size
        )
    }
}

impl From<v4l2_pix_format> for PixFormat {
    fn from(fmt: v4l2_pix_format) -> Self {
        PixFormat {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
        }
    }
}

impl From<PixFormat> for v4l2_pix_format {
    fn from(format: PixFormat) -> Self {
        v4l2_pix_format {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: V4L2_FIELD_NONE,
            bytesperline: format.stride,
            sizeimage: format.size,
            ..unsafe { std::mem::zeroed() }
        }
    }
}
