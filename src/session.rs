use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::capability::Flags;
use crate::device::{Device, Handle};
use crate::error::{Error, Result};
use crate::v4l2::videodev::{V4L2_BUF_TYPE_VIDEO_CAPTURE, V4L2_BUF_TYPE_VIDEO_OUTPUT};
use crate::PixFormat;

/// Data flow direction of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device fills buffers, process drains them
    Capture,
    /// Process fills buffers, device drains them
    Output,
}

impl Direction {
    /// The matching v4l2 buffer queue type
    pub fn buf_type(self) -> u32 {
        match self {
            Direction::Capture => V4L2_BUF_TYPE_VIDEO_CAPTURE,
            Direction::Output => V4L2_BUF_TYPE_VIDEO_OUTPUT,
        }
    }

    /// The capability flag a device must advertise for this direction
    pub fn capability(self) -> Flags {
        match self {
            Direction::Capture => Flags::VIDEO_CAPTURE,
            Direction::Output => Flags::VIDEO_OUTPUT,
        }
    }
}

/// Everything a session negotiation needs to know.
///
/// The binaries fill this from a handful of flags; the geometry and pool
/// size defaults mirror the reference configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device node path
    pub path: PathBuf,
    /// Data flow direction
    pub direction: Direction,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Target frame rate
    pub fps: u32,
    /// Number of pool buffers to request
    pub buffer_count: u32,
}

impl SessionConfig {
    /// Returns a config with the reference defaults (VGA YUYV, 15 fps, two
    /// buffers)
    pub fn new<P: Into<PathBuf>>(path: P, direction: Direction) -> Self {
        SessionConfig {
            path: path.into(),
            direction,
            width: 640,
            height: 480,
            fps: 15,
            buffer_count: 2,
        }
    }

    /// The format this config asks the driver for
    pub fn format(&self) -> PixFormat {
        PixFormat::yuyv(self.width, self.height)
    }
}

/// One open streaming device with a negotiated format.
///
/// Format and direction are fixed for the session's lifetime; there is no
/// renegotiation. The device node is closed when the session (and any pool
/// sharing its handle) is gone.
pub struct Session {
    device: Device,
    direction: Direction,
    format: PixFormat,
}

impl Session {
    /// Opens the device and negotiates capabilities and format
    ///
    /// Fails with [`Error::UnsupportedDevice`] when the node is missing the
    /// direction's capability or streaming support, and with
    /// [`Error::FormatRejected`] when the driver refuses the requested
    /// geometry or silently substitutes another one.
    pub fn negotiate(config: &SessionConfig) -> Result<Self> {
        let device = Device::open(&config.path)?;

        let caps = device.query_caps()?;
        let needed = config.direction.capability() | Flags::STREAMING;
        if !caps.capabilities.contains(needed) {
            return Err(Error::UnsupportedDevice {
                missing: needed.difference(caps.capabilities),
                found: caps.capabilities,
            });
        }

        let requested = config.format();
        let actual = device
            .set_format(config.direction.buf_type(), &requested)
            .map_err(|source| Error::FormatRejected {
                requested: requested.to_string(),
                source,
            })?;

        // Drivers may adjust instead of refusing; a different geometry or
        // layout is just as unusable for fixed-size raw frames.
        if actual.width != requested.width
            || actual.height != requested.height
            || actual.fourcc != requested.fourcc
        {
            return Err(Error::FormatRejected {
                requested: requested.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("driver substituted {}", actual),
                ),
            });
        }

        info!(
            device = %config.path.display(),
            driver = %caps.driver,
            card = %caps.card,
            format = %actual,
            "session negotiated"
        );

        Ok(Session {
            device,
            direction: config.direction,
            format: actual,
        })
    }

    /// Returns the shared device handle
    pub fn handle(&self) -> Arc<Handle> {
        self.device.handle()
    }

    /// Data flow direction fixed at negotiation
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Format fixed at negotiation
    pub fn format(&self) -> &PixFormat {
        &self.format
    }
}
