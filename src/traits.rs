//! Seams between the pipelines and the buffer queue.
//!
//! The pipelines only ever talk to these traits, so the unit tests can drive
//! them with scripted in-memory queues instead of a device node.

use std::thread;
use std::time::Duration;

use crate::error::Result;

/// How many immediate dequeue attempts a cycle makes before giving up on the
/// frame.
pub const DEQUEUE_RETRIES: u32 = 3;

/// Backoff between dequeue attempts while the device reports "not ready".
pub const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Outcome of one dequeue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dequeued {
    /// The device handed a buffer back to the process
    Frame {
        /// Pool index of the buffer
        index: usize,
        /// Bytes of meaningful payload in the buffer
        bytes_used: u32,
    },
    /// No buffer ready yet; retryable
    NotReady,
}

/// Outcome of a bounded readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// A buffer can be dequeued
    Ready,
    /// The timeout elapsed with nothing to dequeue
    TimedOut,
    /// A signal interrupted the wait; re-enter it after checking for a
    /// pending stop request
    Interrupted,
}

/// Shared dequeue surface of both queue directions
pub trait DequeueSource {
    /// Retrieves one buffer the device has finished with
    fn dequeue(&mut self) -> Result<Dequeued>;
}

/// Buffer queue of a capture session: the device fills, the process drains.
pub trait CaptureQueue: DequeueSource {
    /// Waits until a filled buffer is available, bounded by `timeout`
    fn wait_ready(&mut self, timeout: Duration) -> Result<Wait>;

    /// Read access to a dequeued buffer's mapping
    ///
    /// `index` must come from a [`Dequeued::Frame`] that has not been
    /// re-enqueued yet; the mapping belongs to the kernel otherwise.
    fn frame(&self, index: usize) -> &[u8];

    /// Hands the buffer back to the device, payload cleared
    fn enqueue(&mut self, index: usize) -> Result<()>;
}

/// Buffer queue of an output session: the process fills, the device drains.
pub trait OutputQueue: DequeueSource {
    /// Write access to a dequeued buffer's mapping
    ///
    /// Same ownership contract as [`CaptureQueue::frame`].
    fn frame_mut(&mut self, index: usize) -> &mut [u8];

    /// Hands the buffer to the device with `bytes_used` bytes of payload
    fn enqueue(&mut self, index: usize, bytes_used: u32) -> Result<()>;
}

/// Dequeues with the bounded retry policy shared by both pipelines.
///
/// Returns `None` when the device stayed "not ready" through every attempt;
/// the caller treats that as a skipped frame, not a failure.
pub fn dequeue_with_retry<Q: DequeueSource + ?Sized>(
    queue: &mut Q,
) -> Result<Option<(usize, u32)>> {
    for attempt in 0..DEQUEUE_RETRIES {
        match queue.dequeue()? {
            Dequeued::Frame { index, bytes_used } => return Ok(Some((index, bytes_used))),
            Dequeued::NotReady => {
                if attempt + 1 < DEQUEUE_RETRIES {
                    thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    Ok(None)
}
