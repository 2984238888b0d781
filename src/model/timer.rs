/// Wall-clock race timer. Stopping is one-way: later stops are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    start_ms: f64,
    stopped_at: Option<f64>,
}

impl Timer {
    pub fn start(now_ms: f64) -> Self {
        Self { start_ms: now_ms, stopped_at: None }
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        let end = self.stopped_at.unwrap_or(now_ms);
        (end - self.start_ms).max(0.0)
    }

    pub fn stop(&mut self, now_ms: f64) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(now_ms);
        }
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn display(&self, now_ms: f64) -> String {
        format_elapsed(self.elapsed_ms(now_ms))
    }
}

/// `MM:SS:mmm`, minutes grow past two digits instead of wrapping
pub fn format_elapsed(elapsed_ms: f64) -> String {
    let total = elapsed_ms.max(0.0).floor() as u64;
    let millis = total % 1000;
    let seconds = (total / 1000) % 60;
    let minutes = total / 60_000;
    format!("{:02}:{:02}:{:03}", minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(61_234.0), "01:01:234");
        assert_eq!(format_elapsed(234.0), "00:00:234");
        assert_eq!(format_elapsed(0.0), "00:00:000");
        assert_eq!(format_elapsed(6_000_000.0), "100:00:000");
    }

    #[test]
    fn test_stop_freezes_elapsed() {
        let mut t = Timer::start(1_000.0);
        assert_eq!(t.elapsed_ms(1_500.0), 500.0);
        t.stop(2_000.0);
        t.stop(9_000.0);
        assert!(!t.is_running());
        assert_eq!(t.elapsed_ms(50_000.0), 1_000.0);
        assert_eq!(t.display(50_000.0), "00:01:000");
    }
}
