use std::time::{Duration, Instant};

/// Wall clock time of a planning step.
pub struct Timer {
    started_at: Instant,
}

impl Timer {
    pub fn started() -> Self {
        Timer {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;

    #[test]
    fn test_elapsed_grows() {
        let timer = Timer::started();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let first = timer.elapsed();
        assert!(first.as_millis() >= 5);
        assert!(timer.elapsed() >= first);
    }
}
