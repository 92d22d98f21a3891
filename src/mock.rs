//! Scripted in-memory queues for pipeline tests.
//!
//! Both mocks track which side currently owns each buffer and panic when the
//! ownership handoff is violated — a buffer's memory must never be touched
//! between its enqueue and the matching dequeue.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lifecycle::StopFlag;
use crate::traits::{CaptureQueue, DequeueSource, Dequeued, OutputQueue, Wait};

/// One scripted step of a capture session
#[derive(Debug, Clone, Copy)]
pub enum CaptureEvent {
    /// The device filled a buffer
    Frame { index: usize, bytes_used: u32, fill: u8 },
    /// Dequeue reports EAGAIN
    NotReady,
    /// The readiness wait times out
    Timeout,
    /// A signal interrupts the readiness wait
    Interrupted,
    /// Dequeue fails fatally
    Broken,
}

/// Capture queue replaying a fixed event script.
///
/// When the script runs dry the queue requests a stop and reports an
/// interrupted wait, so pipeline runs terminate at the next checkpoint.
pub struct MockCaptureQueue {
    frames: Vec<Vec<u8>>,
    kernel_owned: Vec<bool>,
    events: VecDeque<CaptureEvent>,
    stop: StopFlag,
}

impl MockCaptureQueue {
    pub fn new(buffers: usize, frame_size: u32, events: Vec<CaptureEvent>, stop: StopFlag) -> Self {
        MockCaptureQueue {
            frames: vec![vec![0u8; frame_size as usize]; buffers],
            // enqueue_all has run by the time a pipeline starts
            kernel_owned: vec![true; buffers],
            events: events.into(),
            stop,
        }
    }

    /// True when every buffer has been handed back to the device
    pub fn all_buffers_with_kernel(&self) -> bool {
        self.kernel_owned.iter().all(|&owned| owned)
    }
}

impl DequeueSource for MockCaptureQueue {
    fn dequeue(&mut self) -> Result<Dequeued> {
        match self.events.pop_front() {
            Some(CaptureEvent::Frame {
                index,
                bytes_used,
                fill,
            }) => {
                assert!(
                    self.kernel_owned[index],
                    "device completed buffer {index} it does not hold"
                );
                self.kernel_owned[index] = false;
                self.frames[index].fill(fill);
                Ok(Dequeued::Frame { index, bytes_used })
            }
            Some(CaptureEvent::NotReady) => Ok(Dequeued::NotReady),
            Some(CaptureEvent::Broken) => Err(Error::DequeueFailed(io::Error::new(
                io::ErrorKind::InvalidData,
                "scripted protocol failure",
            ))),
            _ => Ok(Dequeued::NotReady),
        }
    }
}

impl CaptureQueue for MockCaptureQueue {
    fn wait_ready(&mut self, _timeout: Duration) -> Result<Wait> {
        match self.events.front() {
            None => {
                self.stop.request_stop();
                Ok(Wait::Interrupted)
            }
            Some(CaptureEvent::Timeout) => {
                self.events.pop_front();
                Ok(Wait::TimedOut)
            }
            Some(CaptureEvent::Interrupted) => {
                self.events.pop_front();
                Ok(Wait::Interrupted)
            }
            Some(_) => Ok(Wait::Ready),
        }
    }

    fn frame(&self, index: usize) -> &[u8] {
        assert!(
            !self.kernel_owned[index],
            "read of buffer {index} while the device holds it"
        );
        &self.frames[index]
    }

    fn enqueue(&mut self, index: usize) -> Result<()> {
        assert!(
            !self.kernel_owned[index],
            "enqueue of buffer {index} the device already holds"
        );
        self.kernel_owned[index] = true;
        Ok(())
    }
}

/// Output queue that "displays" instantly: every enqueued payload is copied
/// to the emitted log and the buffer becomes dequeueable again.
pub struct MockOutputQueue {
    frames: Vec<Vec<u8>>,
    kernel_owned: Vec<bool>,
    free: VecDeque<usize>,
    emitted: Vec<Vec<u8>>,
    starve: u32,
}

impl MockOutputQueue {
    pub fn new(buffers: usize, frame_size: u32) -> Self {
        MockOutputQueue {
            frames: vec![vec![0u8; frame_size as usize]; buffers],
            kernel_owned: vec![true; buffers],
            free: (0..buffers).collect(),
            emitted: Vec::new(),
            starve: 0,
        }
    }

    /// Makes the next `count` dequeue attempts report "not ready"
    pub fn starve_next(&mut self, count: u32) {
        self.starve = count;
    }

    /// Payloads handed to the device so far, in emission order
    pub fn emitted(&self) -> &[Vec<u8>] {
        &self.emitted
    }
}

impl DequeueSource for MockOutputQueue {
    fn dequeue(&mut self) -> Result<Dequeued> {
        if self.starve > 0 {
            self.starve -= 1;
            return Ok(Dequeued::NotReady);
        }

        match self.free.pop_front() {
            Some(index) => {
                assert!(
                    self.kernel_owned[index],
                    "device released buffer {index} it does not hold"
                );
                self.kernel_owned[index] = false;
                Ok(Dequeued::Frame {
                    index,
                    bytes_used: 0,
                })
            }
            None => Ok(Dequeued::NotReady),
        }
    }
}

impl OutputQueue for MockOutputQueue {
    fn frame_mut(&mut self, index: usize) -> &mut [u8] {
        assert!(
            !self.kernel_owned[index],
            "write to buffer {index} while the device holds it"
        );
        &mut self.frames[index]
    }

    fn enqueue(&mut self, index: usize, bytes_used: u32) -> Result<()> {
        assert!(
            !self.kernel_owned[index],
            "enqueue of buffer {index} the device already holds"
        );
        self.kernel_owned[index] = true;
        self.emitted
            .push(self.frames[index][..bytes_used as usize].to_vec());
        self.free.push_back(index);
        Ok(())
    }
}
