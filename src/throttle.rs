use std::cell::Cell;
use std::time::{Duration, Instant};

/// Spaces successive calls by at least `min_interval`. Blocking; the
/// pipeline is single-threaded so a `Cell` is enough.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Throttle {
            min_interval,
            last: Cell::new(None),
        }
    }

    /// Sleep until `min_interval` has passed since the previous call.
    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_does_not_wait() {
        let throttle = Throttle::new(Duration::from_secs(5));
        let t0 = Instant::now();
        throttle.wait();
        assert!(t0.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn successive_calls_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(30));
        let t0 = Instant::now();
        throttle.wait();
        throttle.wait();
        throttle.wait();
        assert!(t0.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn zero_interval_never_sleeps() {
        let throttle = Throttle::new(Duration::ZERO);
        let t0 = Instant::now();
        for _ in 0..100 {
            throttle.wait();
        }
        assert!(t0.elapsed() < Duration::from_secs(1));
    }
}
