use std::path::Path;
use std::sync::Arc;
use std::{io, mem};

use crate::v4l2;
use crate::v4l2::videodev::*;
use crate::{Capabilities, PixFormat};

/// Device handle for low-level access.
///
/// Acquiring a handle facilitates (possibly mutating) interactions with the
/// device. The descriptor is closed exactly once, when the last clone of the
/// `Arc` wrapping the handle goes away.
pub struct Handle {
    fd: std::os::raw::c_int,
}

impl Handle {
    /// Returns the raw file descriptor
    pub fn fd(&self) -> std::os::raw::c_int {
        self.fd
    }

    /// Polls the file descriptor for I/O readiness
    ///
    /// Returns the number of ready descriptors (0 on timeout). EINTR is
    /// reported as `io::ErrorKind::Interrupted` so callers can re-enter the
    /// wait after checking for a pending stop request.
    ///
    /// # Arguments
    ///
    /// * `events` - Requested events such as `libc::POLLIN`
    /// * `timeout` - Timeout in milliseconds, -1 to block indefinitely
    pub fn poll(&self, events: i16, timeout: i32) -> io::Result<i32> {
        let mut fds = libc::pollfd {
            fd: self.fd,
            events,
            revents: 0,
        };

        let ret = unsafe { libc::poll(&mut fds, 1, timeout) };
        if ret == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // ignore errors
        let _ = v4l2::close(self.fd);
    }
}

/// An open streaming device node
pub struct Device {
    handle: Arc<Handle>,
}

impl Device {
    /// Opens the device node in non-blocking mode
    ///
    /// With O_NONBLOCK, a dequeue against an empty queue returns EAGAIN
    /// instead of stalling; the pipelines' retry policies rely on that.
    ///
    /// # Arguments
    ///
    /// * `path` - Node path, e.g. /dev/video1
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let fd = v4l2::open(&path, libc::O_RDWR | libc::O_NONBLOCK)?;

        Ok(Device {
            handle: Arc::new(Handle { fd }),
        })
    }

    /// Returns the handle, shared with any buffer pool built on this device
    pub fn handle(&self) -> Arc<Handle> {
        self.handle.clone()
    }

    /// Query for device capabilities
    pub fn query_caps(&self) -> io::Result<Capabilities> {
        unsafe {
            let mut v4l2_caps: v4l2_capability = mem::zeroed();
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_QUERYCAP,
                &mut v4l2_caps as *mut _ as *mut std::os::raw::c_void,
            )?;

            Ok(Capabilities::from(v4l2_caps))
        }
    }

    /// Requests a format and returns what the driver actually configured
    ///
    /// The driver is free to adjust any field; callers decide whether the
    /// echoed format is close enough.
    ///
    /// # Arguments
    ///
    /// * `buf_type` - Queue the format applies to (capture or output)
    /// * `format` - Desired format
    pub fn set_format(&self, buf_type: u32, format: &PixFormat) -> io::Result<PixFormat> {
        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: buf_type,
                fmt: v4l2_format_union { pix: (*format).into() },
            };
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_S_FMT,
                &mut v4l2_fmt as *mut _ as *mut std::os::raw::c_void,
            )?;

            Ok(PixFormat::from(v4l2_fmt.fmt.pix))
        }
    }

    /// Returns the currently configured format
    pub fn format(&self, buf_type: u32) -> io::Result<PixFormat> {
        unsafe {
            let mut v4l2_fmt = v4l2_format {
                type_: buf_type,
                fmt: mem::zeroed(),
            };
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_G_FMT,
                &mut v4l2_fmt as *mut _ as *mut std::os::raw::c_void,
            )?;

            Ok(PixFormat::from(v4l2_fmt.fmt.pix))
        }
    }
}
