//! Shared helpers for unit tests.

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::Mutex;

/// Clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn advance(&self, delta: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}
