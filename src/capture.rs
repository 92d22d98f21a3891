use std::io::Write;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::Result;
use crate::lifecycle::StopFlag;
use crate::traits::{dequeue_with_retry, CaptureQueue, Wait};
use crate::PixFormat;

/// Upper bound on waiting for the device to fill a buffer. Generous, so a
/// slow source surfaces as skipped frames rather than a busy loop of
/// spurious timeouts.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened over a capture run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    /// Frames fully persisted to the sink
    pub frames: u64,
    /// Cycles that produced no buffer (wait timeout or retries exhausted)
    pub skipped: u64,
    /// Dequeued buffers whose payload size was implausible and was not
    /// written
    pub dropped: u64,
    /// Frames lost to failed or short sink writes
    pub sink_errors: u64,
}

/// Drains filled buffers from a capture queue into a byte sink.
///
/// One cycle is wait → dequeue → validate → persist → requeue; the stop
/// flag is observed between cycles only, an in-flight wait always runs to
/// readiness, timeout or interruption first.
pub struct CapturePipeline {
    frame_size: u32,
    wait_timeout: Duration,
    report: CaptureReport,
}

impl CapturePipeline {
    /// Returns a pipeline for frames of the session's negotiated format
    pub fn new(format: &PixFormat) -> Self {
        CapturePipeline {
            frame_size: format.size,
            wait_timeout: WAIT_TIMEOUT,
            report: CaptureReport::default(),
        }
    }

    /// Runs until a stop is requested; returns the final counters
    ///
    /// Non-fatal conditions (timeouts, empty dequeues, implausible payload
    /// sizes, sink write trouble) are counted and the next cycle continues
    /// independently. Queue protocol failures abort with the error.
    ///
    /// # Arguments
    ///
    /// * `queue` - Buffer queue to drain
    /// * `sink` - Byte sink the raw payloads are appended to
    /// * `stop` - Cooperative stop request, checked between cycles
    pub fn run<Q, W>(mut self, queue: &mut Q, sink: &mut W, stop: &StopFlag) -> Result<CaptureReport>
    where
        Q: CaptureQueue + ?Sized,
        W: Write,
    {
        while !stop.is_set() {
            match queue.wait_ready(self.wait_timeout)? {
                Wait::TimedOut => {
                    warn!("capture wait timed out, skipping frame");
                    self.report.skipped += 1;
                    continue;
                }
                // stop requests are observed at the loop top
                Wait::Interrupted => continue,
                Wait::Ready => {}
            }

            let Some((index, bytes_used)) = dequeue_with_retry(queue)? else {
                warn!("no buffer ready after retries, skipping frame");
                self.report.skipped += 1;
                continue;
            };

            self.persist(queue, sink, index, bytes_used);

            // hand the buffer back with its payload cleared
            queue.enqueue(index)?;
        }

        debug!(frames = self.report.frames, "capture stopped");
        Ok(self.report)
    }

    /// Validates the payload and appends it to the sink. Never retries: a
    /// short or failed write loses this frame only and the next cycle
    /// starts fresh.
    fn persist<Q, W>(&mut self, queue: &Q, sink: &mut W, index: usize, bytes_used: u32)
    where
        Q: CaptureQueue + ?Sized,
        W: Write,
    {
        if bytes_used == 0 || bytes_used > self.frame_size {
            warn!(index, bytes_used, "implausible payload size, frame dropped");
            self.report.dropped += 1;
            return;
        }

        let payload = &queue.frame(index)[..bytes_used as usize];
        match sink.write(payload) {
            Ok(written) if written == payload.len() => {
                self.report.frames += 1;
                debug!(frame = self.report.frames, bytes = written, "frame persisted");
            }
            Ok(written) => {
                warn!(expected = payload.len(), written, "short sink write, frame lost");
                self.report.sink_errors += 1;
            }
            Err(e) => {
                error!(error = %e, "sink write failed, frame lost");
                self.report.sink_errors += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CaptureEvent, MockCaptureQueue};
    use crate::Error;

    const FORMAT: PixFormat = PixFormat::yuyv(16, 2);

    fn run(events: Vec<CaptureEvent>) -> (CaptureReport, Vec<u8>, MockCaptureQueue) {
        let stop = StopFlag::new();
        let mut queue = MockCaptureQueue::new(2, FORMAT.size, events, stop.clone());
        let mut sink = Vec::new();
        let report = CapturePipeline::new(&FORMAT)
            .run(&mut queue, &mut sink, &stop)
            .expect("pipeline should not fail");
        (report, sink, queue)
    }

    #[test]
    fn persists_exactly_bytes_used() {
        let (report, sink, _) = run(vec![
            CaptureEvent::Frame {
                index: 0,
                bytes_used: FORMAT.size,
                fill: 0xaa,
            },
            CaptureEvent::Frame {
                index: 1,
                bytes_used: 10,
                fill: 0xbb,
            },
        ]);

        assert_eq!(report.frames, 2);
        assert_eq!(sink.len(), FORMAT.size as usize + 10);
        assert!(sink[..FORMAT.size as usize].iter().all(|&b| b == 0xaa));
        assert!(sink[FORMAT.size as usize..].iter().all(|&b| b == 0xbb));
    }

    #[test]
    fn drops_empty_and_oversized_payloads() {
        let (report, sink, _) = run(vec![
            CaptureEvent::Frame {
                index: 0,
                bytes_used: 0,
                fill: 0,
            },
            CaptureEvent::Frame {
                index: 1,
                bytes_used: FORMAT.size + 1,
                fill: 0,
            },
        ]);

        assert_eq!(report.frames, 0);
        assert_eq!(report.dropped, 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn timeout_skips_and_continues() {
        let (report, sink, _) = run(vec![
            CaptureEvent::Timeout,
            CaptureEvent::Frame {
                index: 0,
                bytes_used: 4,
                fill: 1,
            },
        ]);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.frames, 1);
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn retry_exhaustion_skips_not_fails() {
        let (report, _, _) = run(vec![
            CaptureEvent::NotReady,
            CaptureEvent::NotReady,
            CaptureEvent::NotReady,
            CaptureEvent::Frame {
                index: 0,
                bytes_used: 4,
                fill: 2,
            },
        ]);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.frames, 1);
    }

    #[test]
    fn interrupted_wait_reenters() {
        let (report, _, _) = run(vec![
            CaptureEvent::Interrupted,
            CaptureEvent::Frame {
                index: 0,
                bytes_used: 4,
                fill: 3,
            },
        ]);

        assert_eq!(report.frames, 1);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn sink_failure_is_not_fatal() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let stop = StopFlag::new();
        let mut queue = MockCaptureQueue::new(
            2,
            FORMAT.size,
            vec![
                CaptureEvent::Frame {
                    index: 0,
                    bytes_used: 4,
                    fill: 0,
                },
                CaptureEvent::Frame {
                    index: 1,
                    bytes_used: 4,
                    fill: 0,
                },
            ],
            stop.clone(),
        );
        let report = CapturePipeline::new(&FORMAT)
            .run(&mut queue, &mut FailingSink, &stop)
            .expect("write failures must not abort the pipeline");

        assert_eq!(report.sink_errors, 2);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn short_write_is_reported_not_retried() {
        struct ShortSink(Vec<u8>);
        impl Write for ShortSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                let half = (buf.len() / 2).max(1);
                self.0.extend_from_slice(&buf[..half]);
                Ok(half)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let stop = StopFlag::new();
        let mut queue = MockCaptureQueue::new(
            1,
            FORMAT.size,
            vec![CaptureEvent::Frame {
                index: 0,
                bytes_used: 8,
                fill: 0,
            }],
            stop.clone(),
        );
        let mut sink = ShortSink(Vec::new());
        let report = CapturePipeline::new(&FORMAT)
            .run(&mut queue, &mut sink, &stop)
            .expect("short writes must not abort the pipeline");

        assert_eq!(report.sink_errors, 1);
        assert_eq!(report.frames, 0);
        // exactly one unretried write attempt happened
        assert_eq!(sink.0.len(), 4);
    }

    #[test]
    fn every_frame_is_requeued() {
        let (_, _, queue) = run(vec![
            CaptureEvent::Frame {
                index: 0,
                bytes_used: 4,
                fill: 0,
            },
            CaptureEvent::Frame {
                index: 1,
                bytes_used: 0, // dropped, must still be requeued
                fill: 0,
            },
        ]);

        assert!(queue.all_buffers_with_kernel());
    }

    #[test]
    fn fatal_dequeue_error_aborts() {
        let stop = StopFlag::new();
        let mut queue = MockCaptureQueue::new(
            1,
            FORMAT.size,
            vec![CaptureEvent::Broken],
            stop.clone(),
        );
        let mut sink = Vec::new();
        let err = CapturePipeline::new(&FORMAT)
            .run(&mut queue, &mut sink, &stop)
            .expect_err("protocol errors are fatal");
        assert!(matches!(err, Error::DequeueFailed(_)));
    }
}
