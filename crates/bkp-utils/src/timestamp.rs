use chrono::{DateTime, Local};

/// Time source. The engine reads the clock once per invocation so a single
/// command never straddles two archive timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Pinned time, for deterministic naming in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Archive name timestamp: `YYYY-MM-DD-HH-MM`, local time.
pub fn archive_timestamp(t: DateTime<Local>) -> String {
    t.format("%Y-%m-%d-%H-%M").to_string()
}

/// RFC 3339 timestamp for verification sidecars.
pub fn rfc3339(t: DateTime<Local>) -> String {
    t.to_rfc3339()
}
