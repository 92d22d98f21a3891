//! Memory-mapped V4L2 streaming tools.
//!
//! One buffer-pool abstraction, two directions: the capture pipeline drains
//! filled device buffers into a raw byte sink, the output pipeline feeds a
//! cycling YUYV test pattern into a display device under frame-rate pacing.
//! The `capture` and `emit` binaries wire the pieces to real device nodes.

pub mod v4l2;

pub mod capability;
pub use capability::Capabilities;

mod fourcc;
pub use fourcc::FourCC;

mod format;
pub use format::PixFormat;

mod error;
pub use error::{Error, Result};

mod device;
pub use device::{Device, Handle};

mod session;
pub use session::{Direction, Session, SessionConfig};

mod pool;
pub use pool::Pool;

pub mod traits;
pub use traits::{Dequeued, Wait};

pub mod pattern;
pub use pattern::{PatternState, SolidColor};

mod capture;
pub use capture::{CapturePipeline, CaptureReport};

mod output;
pub use output::{OutputPipeline, OutputReport};

mod lifecycle;
pub use lifecycle::StopFlag;

#[cfg(test)]
mod mock;
