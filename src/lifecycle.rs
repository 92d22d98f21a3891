use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Cooperative stop request.
///
/// A cloneable cancellation token backed by one atomic flag. Pipelines
/// observe it at defined checkpoints (the top of each capture cycle);
/// in-flight blocking waits are not preempted, they finish or time out
/// before the flag is seen. The signal handler thread only ever stores the
/// flag, so the pipelines stay single-threaded.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Returns a fresh, unset flag
    pub fn new() -> Self {
        StopFlag::default()
    }

    /// Registers a SIGINT handler that sets the flag
    ///
    /// Call at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let flag = self.0.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            info!("interrupt received, stopping after the current cycle");
        })
    }

    /// Requests a stop at the next checkpoint
    pub fn request_stop(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            info!("stop requested");
        }
    }

    /// Whether a stop has been requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_set());

        flag.request_stop();
        assert!(observer.is_set());

        // requesting again is harmless
        flag.request_stop();
        assert!(observer.is_set());
    }
}
