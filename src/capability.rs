use std::fmt;

use bitflags::bitflags;

use crate::v4l2::videodev::v4l2_capability;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        /// Is a video capture device
        const VIDEO_CAPTURE         = 0x00000001;
        /// Is a video output device
        const VIDEO_OUTPUT          = 0x00000002;
        /// Can do video overlay
        const VIDEO_OVERLAY         = 0x00000004;
        /// Is a video mem-to-mem device
        const VIDEO_M2M             = 0x00008000;
        /// Read/write systemcalls
        const READ_WRITE            = 0x01000000;
        /// Async I/O
        const ASYNC_IO              = 0x02000000;
        /// Streaming I/O ioctls
        const STREAMING             = 0x04000000;
        /// Sets device capabilities field
        const DEVICE_CAPS           = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Flags {
        Flags::from_bits_truncate(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> u32 {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
/// Device capabilities
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capability flags of the physical device as a whole
    pub capabilities: Flags,
    /// Capability flags of the opened node, valid when DEVICE_CAPS is set
    pub device_caps: Flags,
}

/// The fixed-size string fields are NUL padded.
fn string_from_cstr(buf: &[u8]) -> String {
    buf.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

impl From<v4l2_capability> for Capabilities {
    fn from(caps: v4l2_capability) -> Self {
        Capabilities {
            driver: string_from_cstr(&caps.driver),
            card: string_from_cstr(&caps.card),
            bus: string_from_cstr(&caps.bus_info),
            version: (
                ((caps.version >> 16) & 0xff) as u8,
                ((caps.version >> 8) & 0xff) as u8,
                (caps.version & 0xff) as u8,
            ),
            capabilities: Flags::from(caps.capabilities),
            device_caps: Flags::from(caps.device_caps),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilities: {}", self.capabilities)?;
        Ok(())
    }
}
