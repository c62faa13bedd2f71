//! Monotonic stopwatch used by the timer scheduler.

use std::time::Instant;

/// Elapsed-time source with reset.
///
/// Monotonic and unaffected by wall-clock jumps. Never surfaced to
/// clients; the timer scheduler uses it to compute sweep deltas, and the
/// get loop uses a per-call instance to track its own timeout budget.
#[derive(Debug, Clone)]
pub(crate) struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds elapsed since construction or the last reset.
    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub(crate) fn reset(&mut self) {
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn elapsed_is_non_decreasing() {
        let watch = Stopwatch::new();
        let first = watch.elapsed_secs();
        let second = watch.elapsed_secs();
        assert!(second >= first);
        assert!(first >= 0.0);
    }

    #[test]
    fn reset_restarts_from_zero() {
        let mut watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(20));
        assert!(watch.elapsed_secs() >= 0.02);
        watch.reset();
        assert!(watch.elapsed_secs() < 0.02);
    }
}
