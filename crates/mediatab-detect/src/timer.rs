//! Deadline bookkeeping for the observers.
//!
//! Nothing here sleeps. Owners expose their next deadline and the host calls
//! back with the current wall-clock time; a due timer fires exactly once per
//! call.

/// One-shot timer, the `setTimeout`/`clearTimeout` pair.
#[derive(Debug, Clone, Default)]
pub struct Timeout {
    deadline: Option<f64>,
}

impl Timeout {
    /// (Re)arm the timer. An already pending deadline is replaced.
    pub fn set(&mut self, deadline: f64) {
        self.deadline = Some(deadline);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the timer if it is due at `now`.
    pub fn fire(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Repeating timer, the `setInterval`/`clearInterval` pair.
///
/// Ticks that were missed because the host called back late are coalesced
/// into one.
#[derive(Debug, Clone)]
pub struct Interval {
    period: f64,
    next: Option<f64>,
}

impl Interval {
    pub fn new(period: f64) -> Self {
        Self { period, next: None }
    }

    /// Start ticking one period after `now`.
    pub fn start(&mut self, now: f64) {
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.next
    }

    /// Consume one tick if due at `now` and schedule the next one.
    pub fn fire(&mut self, now: f64) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if next > now {
            return false;
        }
        let mut following = next + self.period;
        if following <= now {
            following = now + self.period;
        }
        self.next = Some(following);
        true
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    deadlines.into_iter().flatten().reduce(f64::min)
}
