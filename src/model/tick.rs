use chrono::{DateTime, Timelike, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub received_at: DateTime<Utc>,
}

impl Tick {
    pub fn new(price: f64, received_at: DateTime<Utc>) -> Self {
        Self { price, received_at }
    }

    /// Tick stamped with the current wall clock.
    pub fn now(price: f64) -> Self {
        Self::new(price, Utc::now())
    }
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}
