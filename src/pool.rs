use std::sync::Arc;
use std::time::Duration;
use std::{io, mem, ptr, slice};

use tracing::{debug, warn};

use crate::device::Handle;
use crate::error::{Error, Result};
use crate::session::{Direction, Session};
use crate::traits::{CaptureQueue, DequeueSource, Dequeued, OutputQueue, Wait};
use crate::v4l2;
use crate::v4l2::videodev::*;

/// Fixed pool of kernel buffers mapped into process memory.
///
/// The pool owns the queue/dequeue handshake with the device: every mapping
/// is shared with the kernel, and content ownership moves to the device on
/// enqueue and back to the process on the matching dequeue. Nothing here
/// enforces that with locks — the contract is that callers never touch a
/// mapping while the device holds its buffer queued, which the pipelines
/// uphold by construction.
///
/// `release` is idempotent and also runs from Drop, so streaming is stopped
/// and every mapping removed exactly once on any exit path, including a
/// pool that only got partially mapped.
pub struct Pool {
    handle: Arc<Handle>,
    direction: Direction,
    buf_type: u32,
    count: u32,
    bufs: Vec<(*mut u8, usize)>,
    streaming: bool,
    released: bool,
}

impl Pool {
    /// Requests a buffer pool from the device
    ///
    /// The driver may grant a different count than asked; the granted count
    /// becomes the pool size. An error or an empty grant is
    /// [`Error::AllocationFailed`].
    ///
    /// # Arguments
    ///
    /// * `session` - Negotiated session the pool belongs to
    /// * `count` - Desired number of buffers
    pub fn request(session: &Session, count: u32) -> Result<Self> {
        let buf_type = session.direction().buf_type();
        let handle = session.handle();

        let mut v4l2_reqbufs = v4l2_requestbuffers {
            count,
            type_: buf_type,
            memory: V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        };
        unsafe {
            v4l2::ioctl(
                handle.fd(),
                v4l2::vidioc::VIDIOC_REQBUFS,
                &mut v4l2_reqbufs as *mut _ as *mut std::os::raw::c_void,
            )
            .map_err(Error::AllocationFailed)?;
        }

        if v4l2_reqbufs.count == 0 {
            return Err(Error::AllocationFailed(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "driver granted no buffers",
            )));
        }

        debug!(
            requested = count,
            granted = v4l2_reqbufs.count,
            "buffer pool requested"
        );

        Ok(Pool {
            handle,
            direction: session.direction(),
            buf_type,
            count: v4l2_reqbufs.count,
            bufs: Vec::with_capacity(v4l2_reqbufs.count as usize),
            streaming: false,
            released: false,
        })
    }

    /// Maps every buffer of the pool into process memory
    ///
    /// Output pools are zero-initialized so the device never scans out
    /// whatever the mapping happened to contain. A single failure aborts
    /// with [`Error::MappingFailed`]; the buffers mapped so far are released
    /// by `release` (explicitly or via Drop) — no partial pool is kept
    /// running.
    pub fn map_all(&mut self) -> Result<()> {
        for index in 0..self.count {
            let mut v4l2_buf = v4l2_buffer {
                index,
                type_: self.buf_type,
                memory: V4L2_MEMORY_MMAP,
                ..unsafe { mem::zeroed() }
            };
            unsafe {
                v4l2::ioctl(
                    self.handle.fd(),
                    v4l2::vidioc::VIDIOC_QUERYBUF,
                    &mut v4l2_buf as *mut _ as *mut std::os::raw::c_void,
                )
                .map_err(|source| Error::MappingFailed {
                    index: index as usize,
                    source,
                })?;

                let ptr = v4l2::mmap(
                    ptr::null_mut(),
                    v4l2_buf.length as usize,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    self.handle.fd(),
                    v4l2_buf.m.offset as libc::off_t,
                )
                .map_err(|source| Error::MappingFailed {
                    index: index as usize,
                    source,
                })?;

                self.bufs.push((ptr as *mut u8, v4l2_buf.length as usize));

                if self.direction == Direction::Output {
                    slice::from_raw_parts_mut(ptr as *mut u8, v4l2_buf.length as usize).fill(0);
                }
            }
        }

        Ok(())
    }

    /// Hands every mapped buffer to the device and starts streaming
    ///
    /// Capture pools offer empty buffers for filling; output pools offer the
    /// zeroed mappings, to be pattern-filled as they cycle back.
    pub fn enqueue_all(&mut self) -> Result<()> {
        for index in 0..self.bufs.len() {
            self.enqueue_raw(index, 0).map_err(Error::EnqueueFailed)?;
        }

        self.stream_on()
    }

    /// Waits until the device has a buffer ready for dequeueing
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound on the wait
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<Wait> {
        match self.handle.poll(libc::POLLIN, timeout.as_millis() as i32) {
            Ok(0) => Ok(Wait::TimedOut),
            Ok(_) => Ok(Wait::Ready),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Wait::Interrupted),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Number of buffers in the pool
    pub fn buffer_count(&self) -> usize {
        self.bufs.len()
    }

    /// Stops streaming and removes every mapping; idempotent.
    ///
    /// Runs from Drop as well, so each acquisition is matched by exactly one
    /// release no matter which exit path is taken. Errors are logged rather
    /// than propagated: at teardown time there is nothing left to abort.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.streaming {
            if let Err(e) = self.stream_ioctl(v4l2::vidioc::VIDIOC_STREAMOFF) {
                warn!(error = %e, "stream off failed during release");
            }
            self.streaming = false;
        }

        for (index, (ptr, len)) in self.bufs.drain(..).enumerate() {
            if let Err(e) = unsafe { v4l2::munmap(ptr as *mut std::os::raw::c_void, len) } {
                warn!(index, error = %e, "unmap failed during release");
            }
        }

        // free the device-side pool by requesting 0 buffers; best-effort
        let mut v4l2_reqbufs = v4l2_requestbuffers {
            count: 0,
            type_: self.buf_type,
            memory: V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        };
        let _ = unsafe {
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_REQBUFS,
                &mut v4l2_reqbufs as *mut _ as *mut std::os::raw::c_void,
            )
        };

        debug!("buffer pool released");
    }

    fn stream_on(&mut self) -> Result<()> {
        self.stream_ioctl(v4l2::vidioc::VIDIOC_STREAMON)
            .map_err(Error::StreamControlFailed)?;
        self.streaming = true;
        Ok(())
    }

    fn stream_ioctl(&self, request: v4l2::vidioc::_IOC_TYPE) -> io::Result<()> {
        let mut typ = self.buf_type as std::os::raw::c_int;
        unsafe {
            v4l2::ioctl(
                self.handle.fd(),
                request,
                &mut typ as *mut _ as *mut std::os::raw::c_void,
            )
        }
    }

    fn enqueue_raw(&mut self, index: usize, bytes_used: u32) -> io::Result<()> {
        let mut v4l2_buf = v4l2_buffer {
            index: index as u32,
            type_: self.buf_type,
            memory: V4L2_MEMORY_MMAP,
            bytesused: bytes_used,
            ..unsafe { mem::zeroed() }
        };
        unsafe {
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_QBUF,
                &mut v4l2_buf as *mut _ as *mut std::os::raw::c_void,
            )
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.release();
    }
}

impl DequeueSource for Pool {
    fn dequeue(&mut self) -> Result<Dequeued> {
        let mut v4l2_buf = v4l2_buffer {
            type_: self.buf_type,
            memory: V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        };
        let ret = unsafe {
            v4l2::ioctl(
                self.handle.fd(),
                v4l2::vidioc::VIDIOC_DQBUF,
                &mut v4l2_buf as *mut _ as *mut std::os::raw::c_void,
            )
        };

        match ret {
            Ok(()) => {
                let index = v4l2_buf.index as usize;
                // index validity was fixed at pool construction; anything
                // else means the handshake state is no longer trustworthy
                if index >= self.bufs.len() {
                    return Err(Error::DequeueFailed(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("driver returned out-of-range buffer index {}", index),
                    )));
                }
                Ok(Dequeued::Frame {
                    index,
                    bytes_used: v4l2_buf.bytesused,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Dequeued::NotReady),
            Err(e) => Err(Error::DequeueFailed(e)),
        }
    }
}

impl CaptureQueue for Pool {
    fn wait_ready(&mut self, timeout: Duration) -> Result<Wait> {
        Pool::wait_ready(self, timeout)
    }

    fn frame(&self, index: usize) -> &[u8] {
        let (ptr, len) = self.bufs[index];
        unsafe { slice::from_raw_parts(ptr, len) }
    }

    fn enqueue(&mut self, index: usize) -> Result<()> {
        self.enqueue_raw(index, 0).map_err(Error::EnqueueFailed)
    }
}

impl OutputQueue for Pool {
    fn frame_mut(&mut self, index: usize) -> &mut [u8] {
        let (ptr, len) = self.bufs[index];
        unsafe { slice::from_raw_parts_mut(ptr, len) }
    }

    fn enqueue(&mut self, index: usize, bytes_used: u32) -> Result<()> {
        self.enqueue_raw(index, bytes_used)
            .map_err(Error::EnqueueFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;

    fn anon_mapping(len: usize) -> *mut u8 {
        unsafe {
            v4l2::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
            .expect("anonymous mapping") as *mut u8
        }
    }

    /// Pool over /dev/null with anonymous mappings: the release path (unmap,
    /// best-effort REQBUFS, idempotence guard) runs for real, without a
    /// streaming device.
    fn stub_pool(mapped: usize, count: u32) -> Pool {
        let device = Device::open("/dev/null").expect("open /dev/null");
        Pool {
            handle: device.handle(),
            direction: Direction::Capture,
            buf_type: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            count,
            bufs: (0..mapped).map(|_| (anon_mapping(4096), 4096)).collect(),
            streaming: false,
            released: false,
        }
    }

    #[test]
    fn release_is_idempotent() {
        let mut pool = stub_pool(2, 2);
        pool.release();
        assert_eq!(pool.buffer_count(), 0);

        // the second call must not unmap (or fail on) anything
        pool.release();
        assert_eq!(pool.buffer_count(), 0);
    }

    #[test]
    fn release_handles_partial_pools() {
        // mapping stopped at buffer 2 of 4; the live mappings still go away
        let mut pool = stub_pool(2, 4);
        pool.release();
        assert_eq!(pool.buffer_count(), 0);
    }

    #[test]
    fn drop_runs_release() {
        let pool = stub_pool(1, 1);
        drop(pool);
    }
}
