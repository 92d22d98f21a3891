use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pattern::{PatternState, Phase};
use crate::traits::{dequeue_with_retry, OutputQueue};
use crate::PixFormat;

/// What happened over an output run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputReport {
    /// Frames rendered and handed to the device
    pub emitted: u64,
    /// Cycles that found no free buffer after retries
    pub skipped: u64,
}

/// Feeds pattern frames into an output queue at a fixed rate.
///
/// One cycle is dequeue → generate → mark ready → requeue → pace. Pacing
/// re-measures from each cycle's own start, so drift stays within a single
/// frame period instead of accumulating. There is no graceful-stop channel:
/// an unbounded run ends only with the process (or a fatal queue error).
pub struct OutputPipeline {
    format: PixFormat,
    state: PatternState,
    interval: Duration,
    report: OutputReport,
}

impl OutputPipeline {
    /// Returns a pipeline emitting at `fps` with the pattern schedule
    /// derived from the same rate
    pub fn new(format: &PixFormat, fps: u32) -> Self {
        OutputPipeline {
            format: *format,
            state: PatternState::new(fps),
            interval: Duration::from_secs(1) / fps.max(1),
            report: OutputReport::default(),
        }
    }

    /// Overrides the pacing interval, leaving the pattern schedule alone
    ///
    /// Mostly useful to run bounded tests without real-time sleeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs for `frames` emitted frames, or forever when `None`
    ///
    /// A cycle that finds no free buffer is skipped and counted; queue
    /// protocol failures abort with the error.
    ///
    /// # Arguments
    ///
    /// * `queue` - Buffer queue to feed
    /// * `frames` - Emission budget; `None` runs until process termination
    pub fn run<Q>(mut self, queue: &mut Q, frames: Option<u64>) -> Result<OutputReport>
    where
        Q: OutputQueue + ?Sized,
    {
        info!(format = %self.format, interval = ?self.interval, "output started");

        loop {
            let cycle_start = Instant::now();

            let Some((index, _)) = dequeue_with_retry(queue)? else {
                warn!("no free buffer after retries, skipping cycle");
                self.report.skipped += 1;
                continue;
            };

            // clear the mapping before rendering so phase switches never
            // leave stale rows from the previous pattern
            let data = queue.frame_mut(index);
            data.fill(0);
            self.state.render(&mut data[..self.format.size as usize], &self.format);

            let phase_before = self.state.phase();
            self.state.advance();
            if self.state.phase() != phase_before {
                match self.state.phase() {
                    Phase::Solid => info!(color = %self.state.color(), "switching to solid frames"),
                    Phase::Bars => info!("switching to color bars"),
                }
            }

            // fixed-size frames only: every payload is the full frame
            queue.enqueue(index, self.format.size)?;
            self.report.emitted += 1;
            debug!(frame = self.report.emitted, "frame emitted");

            if let Some(budget) = frames {
                if self.report.emitted >= budget {
                    break;
                }
            }

            // suspend for the rest of this cycle's frame period
            if let Some(remainder) = self.interval.checked_sub(cycle_start.elapsed()) {
                thread::sleep(remainder);
            }
        }

        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOutputQueue;
    use crate::pattern::{render_bars, render_solid, SolidColor};

    const FORMAT: PixFormat = PixFormat::yuyv(16, 2);

    #[test]
    fn emits_the_requested_number_of_frames() {
        let mut queue = MockOutputQueue::new(2, FORMAT.size);
        let report = OutputPipeline::new(&FORMAT, 1000)
            .run(&mut queue, Some(5))
            .expect("bounded run should succeed");

        assert_eq!(report.emitted, 5);
        assert_eq!(queue.emitted().len(), 5);
    }

    #[test]
    fn first_two_frames_are_identical_bars() {
        let mut queue = MockOutputQueue::new(2, FORMAT.size);
        OutputPipeline::new(&FORMAT, 1000)
            .run(&mut queue, Some(5))
            .expect("bounded run should succeed");

        let mut bars = vec![0u8; FORMAT.size as usize];
        render_bars(&mut bars, &FORMAT);

        let emitted = queue.emitted();
        assert_eq!(emitted[0], bars);
        assert_eq!(emitted[0], emitted[1]);
    }

    #[test]
    fn phase_switch_shows_up_in_the_payloads() {
        // 1 fps: two bar frames, then two solid frames of the second color
        let mut queue = MockOutputQueue::new(2, FORMAT.size);
        OutputPipeline::new(&FORMAT, 1)
            .with_interval(Duration::ZERO)
            .run(&mut queue, Some(4))
            .expect("bounded run should succeed");

        let mut solid = vec![0u8; FORMAT.size as usize];
        render_solid(&mut solid, SolidColor::Green);

        let emitted = queue.emitted();
        assert_eq!(emitted[1], emitted[0]);
        assert_eq!(emitted[2], solid);
        assert_eq!(emitted[3], solid);
    }

    #[test]
    fn every_payload_is_a_full_frame() {
        let mut queue = MockOutputQueue::new(2, FORMAT.size);
        OutputPipeline::new(&FORMAT, 1000)
            .run(&mut queue, Some(3))
            .expect("bounded run should succeed");

        assert!(queue
            .emitted()
            .iter()
            .all(|frame| frame.len() == FORMAT.size as usize));
    }

    #[test]
    fn starved_queue_skips_cycles() {
        let mut queue = MockOutputQueue::new(2, FORMAT.size);
        queue.starve_next(3);
        let report = OutputPipeline::new(&FORMAT, 1000)
            .run(&mut queue, Some(1))
            .expect("bounded run should succeed");

        assert_eq!(report.skipped, 1);
        assert_eq!(report.emitted, 1);
    }
}
