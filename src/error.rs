use std::io;

use crate::capability::Flags;

/// Fatal conditions of the streaming tools.
///
/// Everything here aborts its pipeline: the negotiation errors fire before
/// streaming begins, the queue errors mean the buffer protocol state can no
/// longer be trusted. Retryable conditions (EAGAIN, wait timeouts, short
/// sink writes) never show up as `Error` — they are plain values handled
/// inside the pipeline cycles.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node is missing the capability flags this session needs.
    #[error("device does not advertise {missing} (found {found})")]
    UnsupportedDevice { missing: Flags, found: Flags },

    /// The driver did not accept or did not honor the requested format.
    #[error("device rejected format {requested}")]
    FormatRejected {
        requested: String,
        #[source]
        source: io::Error,
    },

    /// VIDIOC_REQBUFS failed or granted an empty pool.
    #[error("buffer pool allocation failed")]
    AllocationFailed(#[source] io::Error),

    /// Establishing the shared mapping for one buffer failed; the pool is
    /// torn down as a whole.
    #[error("mapping buffer {index} failed")]
    MappingFailed {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// VIDIOC_DQBUF failed with something other than EAGAIN.
    #[error("dequeue failed")]
    DequeueFailed(#[source] io::Error),

    /// VIDIOC_QBUF failed; the buffer is orphaned and the cycle cannot
    /// continue.
    #[error("enqueue failed")]
    EnqueueFailed(#[source] io::Error),

    /// VIDIOC_STREAMON / VIDIOC_STREAMOFF failed.
    #[error("stream control failed")]
    StreamControlFailed(#[source] io::Error),

    /// Plumbing around the device and sink (open, poll).
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
