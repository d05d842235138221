use chrono::{DateTime, Utc};

/// One minute bucket of observed prices.
///
/// `close` follows the latest price while the bucket is the window's open
/// candle and is finalized by [`CandleWindow`](crate::window::CandleWindow)
/// when the next minute starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: DateTime<Utc>,
}

impl Candle {
    /// Start a new candle seeded by its opening tick.
    pub fn new(price: f64, open_time: DateTime<Utc>) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            open_time,
        }
    }

    /// Fold another tick of the same minute into the candle.
    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minute(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, m, 0).unwrap()
    }

    #[test]
    fn candle_update_basics() {
        let mut c = Candle::new(100.0, minute(0));
        c.update(105.0);
        c.update(95.0);
        c.update(102.0);

        assert!((c.open - 100.0).abs() < f64::EPSILON);
        assert!((c.high - 105.0).abs() < f64::EPSILON);
        assert!((c.low - 95.0).abs() < f64::EPSILON);
        assert!((c.close - 102.0).abs() < f64::EPSILON);
        assert_eq!(c.open_time, minute(0));
    }

    #[test]
    fn ohlc_ordering_holds_after_updates() {
        let mut c = Candle::new(50.0, minute(2));
        for p in [55.0, 48.0, 51.0, 49.5] {
            c.update(p);
            assert!(c.low <= c.open && c.open <= c.high);
            assert!(c.low <= c.close && c.close <= c.high);
        }
    }
}
