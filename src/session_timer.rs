use chrono::Duration;

// Wall-clock time accrued while a session is running. Time is always passed
// in by the caller as epoch millis, the timer never reads a clock itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionTimer {
    accrued_ms: i64,
    // `Some` while accruing
    running_since_ms: Option<i64>,
}

impl SessionTimer {
    pub fn new() -> Self {
        SessionTimer {
            accrued_ms: 0,
            running_since_ms: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since_ms.is_some()
    }

    // Throws away anything accrued and starts running from `now_ms`.
    pub fn restart(&mut self, now_ms: i64) {
        self.accrued_ms = 0;
        self.running_since_ms = Some(now_ms);
    }

    pub fn resume(&mut self, now_ms: i64) {
        if self.running_since_ms.is_none() {
            self.running_since_ms = Some(now_ms);
        }
    }

    pub fn pause(&mut self, now_ms: i64) {
        if let Some(since) = self.running_since_ms.take() {
            // a clock that went backwards contributes nothing
            self.accrued_ms += (now_ms - since).max(0);
        }
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        match self.running_since_ms {
            None => self.accrued_ms,
            Some(since) => self.accrued_ms + (now_ms - since).max(0),
        }
    }

    pub fn elapsed(&self, now_ms: i64) -> Duration {
        Duration::milliseconds(self.elapsed_ms(now_ms))
    }
}
