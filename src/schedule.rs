use embassy_time::{Duration, Instant};

/// Decides which polled readings get uploaded: the first one, then at most one
/// per interval.
pub struct UploadSchedule {
    interval: Duration,
    last: Option<Instant>,
}

impl UploadSchedule {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last = Some(now);
    }
}
