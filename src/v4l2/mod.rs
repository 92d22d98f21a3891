mod api;
pub mod videodev;
pub mod vidioc;

pub use api::{close, ioctl, mmap, munmap, open};
