//! Synthetic YUYV test patterns and the phase schedule cycling them.
//!
//! Rendering is pure slice manipulation; no device I/O happens here. The
//! generator runs inside the output pipeline's per-frame time budget, so
//! both renderers are simple row fills of precomputed 4-byte codes.

use std::fmt;

use crate::PixFormat;

/// Wall-clock length of the color bar phase
pub const BAR_PHASE_SECS: u32 = 2;
/// Wall-clock length of the solid color phase
pub const SOLID_PHASE_SECS: u32 = 2;

/// 75% intensity bars: white, yellow, cyan, green, magenta, red, blue,
/// black. Each entry is one YUYV encoding unit (Y0 U Y1 V), i.e. two pixels.
const BAR_CODES: [[u8; 4]; 8] = [
    [219, 128, 219, 128], // white
    [210, 16, 210, 240],  // yellow
    [170, 240, 170, 16],  // cyan
    [161, 128, 161, 128], // green
    [138, 16, 138, 240],  // magenta
    [129, 128, 129, 128], // red
    [89, 240, 89, 16],    // blue
    [0, 128, 0, 128],     // black
];

/// Solid frame colors, cycled one step per bar/solid round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidColor {
    Red,
    Green,
    Blue,
    White,
    Black,
}

/// Cycle order of the solid phase
pub const SOLID_PALETTE: [SolidColor; 5] = [
    SolidColor::Red,
    SolidColor::Green,
    SolidColor::Blue,
    SolidColor::White,
    SolidColor::Black,
];

impl SolidColor {
    /// The YUYV encoding unit filling the whole frame
    pub fn code(self) -> [u8; 4] {
        match self {
            SolidColor::Red => [76, 85, 76, 255],
            SolidColor::Green => [88, 0, 88, 85],
            SolidColor::Blue => [32, 255, 32, 170],
            SolidColor::White => [255, 128, 255, 128],
            SolidColor::Black => [0, 128, 0, 128],
        }
    }
}

impl fmt::Display for SolidColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolidColor::Red => "red",
            SolidColor::Green => "green",
            SolidColor::Blue => "blue",
            SolidColor::White => "white",
            SolidColor::Black => "black",
        };
        write!(f, "{}", name)
    }
}

/// Renders the 8-band 75% color bar frame
///
/// The width is split into 8 equal bands; pixel columns past the 8th band
/// boundary (when the width is not divisible by 8) clamp to the last band.
pub fn render_bars(data: &mut [u8], format: &PixFormat) {
    let bar_width = (format.width / 8).max(1);

    for y in 0..format.height {
        for x in (0..format.width).step_by(2) {
            let offset = ((y * format.width + x) * 2) as usize;
            let Some(unit) = data.get_mut(offset..offset + 4) else {
                break;
            };

            let band = ((x / bar_width) as usize).min(BAR_CODES.len() - 1);
            unit.copy_from_slice(&BAR_CODES[band]);
        }
    }
}

/// Fills the frame with one solid color
pub fn render_solid(data: &mut [u8], color: SolidColor) {
    let code = color.code();
    for unit in data.chunks_exact_mut(4) {
        unit.copy_from_slice(&code);
    }
}

/// Which pattern the generator is currently emitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bars,
    Solid,
}

/// Pattern schedule state, advanced exactly once per emitted frame.
///
/// Phase durations are configured in seconds and expressed in frame counts
/// derived from the target frame rate, so a different rate changes the
/// phase length in frames but not in wall-clock time.
#[derive(Debug, Clone)]
pub struct PatternState {
    phase: Phase,
    frame: u32,
    color_index: usize,
    bar_frames: u32,
    solid_frames: u32,
}

impl PatternState {
    /// Returns the initial state: bar phase, counter zero, first palette
    /// color pending
    ///
    /// # Arguments
    ///
    /// * `fps` - Target frame rate the phase durations are derived from
    pub fn new(fps: u32) -> Self {
        PatternState {
            phase: Phase::Bars,
            frame: 0,
            color_index: 0,
            bar_frames: fps.max(1) * BAR_PHASE_SECS,
            solid_frames: fps.max(1) * SOLID_PHASE_SECS,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Color the solid phase currently renders
    pub fn color(&self) -> SolidColor {
        SOLID_PALETTE[self.color_index]
    }

    /// Renders one frame according to the current state
    pub fn render(&self, data: &mut [u8], format: &PixFormat) {
        match self.phase {
            Phase::Bars => render_bars(data, format),
            Phase::Solid => render_solid(data, self.color()),
        }
    }

    /// Advances the schedule by one emitted frame
    ///
    /// Completing the bar phase resets the counter, switches to the solid
    /// phase and moves the color one palette step (wrapping); completing
    /// the solid phase switches back with the color unchanged.
    pub fn advance(&mut self) {
        self.frame += 1;
        match self.phase {
            Phase::Bars => {
                if self.frame >= self.bar_frames {
                    self.frame = 0;
                    self.phase = Phase::Solid;
                    self.color_index = (self.color_index + 1) % SOLID_PALETTE.len();
                }
            }
            Phase::Solid => {
                if self.frame >= self.solid_frames {
                    self.frame = 0;
                    self.phase = Phase::Bars;
                }
            }
        }
    }
}
