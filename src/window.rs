use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::model::candle::Candle;

/// What a call to [`CandleWindow::update`] did to the window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowUpdate {
    /// First tick ever: the window got its first candle.
    Opened,
    /// Same minute as the previous tick: the open candle was extended.
    Extended,
    /// A minute boundary was crossed: the previous candle was closed, a new
    /// one appended, and the oldest evicted if the window overflowed.
    RolledOver { evicted: Option<Candle> },
}

/// Rolling window of the most recent `capacity` one-minute candles.
///
/// The window never reads a clock. Callers pass minute-truncated times, which
/// keeps every transition deterministic.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
    /// Minute and price of the last accepted tick.
    last_seen: Option<(DateTime<Utc>, f64)>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be > 0");
        Self {
            capacity,
            candles: VecDeque::with_capacity(capacity + 1),
            last_seen: None,
        }
    }

    /// Fold one tick into the window.
    ///
    /// `observed_minute` must already be truncated to the minute. A tick whose
    /// minute is earlier than the last recorded minute is rejected with
    /// [`AppError::StaleTick`] and leaves the window untouched.
    pub fn update(
        &mut self,
        price: f64,
        observed_minute: DateTime<Utc>,
    ) -> Result<WindowUpdate, AppError> {
        let outcome = match self.last_seen {
            None => {
                self.candles.push_back(Candle::new(price, observed_minute));
                WindowUpdate::Opened
            }
            Some((last, last_price)) if observed_minute > last => {
                self.candles.push_back(Candle::new(price, observed_minute));

                // The price seen before this tick is the closing tick of the
                // minute that just ended.
                let len = self.candles.len();
                if let Some(prev) = self.candles.get_mut(len - 2) {
                    prev.close = last_price;
                }

                let evicted = if self.candles.len() > self.capacity {
                    self.candles.pop_front()
                } else {
                    None
                };
                WindowUpdate::RolledOver { evicted }
            }
            Some((last, _)) if observed_minute == last => {
                if let Some(open) = self.candles.back_mut() {
                    open.update(price);
                }
                WindowUpdate::Extended
            }
            Some((last, _)) => {
                return Err(AppError::StaleTick {
                    observed: observed_minute,
                    last,
                });
            }
        };

        self.last_seen = Some((observed_minute, price));
        Ok(outcome)
    }

    /// Highest `high` across the window.
    pub fn max(&self) -> Result<f64, AppError> {
        self.candles
            .iter()
            .map(|c| c.high)
            .reduce(f64::max)
            .ok_or(AppError::EmptyWindow)
    }

    /// Lowest `low` across the window.
    pub fn min(&self) -> Result<f64, AppError> {
        self.candles
            .iter()
            .map(|c| c.low)
            .reduce(f64::min)
            .ok_or(AppError::EmptyWindow)
    }

    /// `max / min` over the window.
    pub fn ratio(&self) -> Result<f64, AppError> {
        Ok(self.max()? / self.min()?)
    }

    pub fn is_full(&self) -> bool {
        self.candles.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Candles from oldest to newest.
    pub fn candles(&self) -> impl DoubleEndedIterator<Item = &Candle> {
        self.candles.iter()
    }

    /// The open candle, if any.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
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
    fn first_update_opens_window() {
        let mut w = CandleWindow::new(3);
        assert_eq!(w.update(10.0, minute(0)).unwrap(), WindowUpdate::Opened);
        assert_eq!(w.len(), 1);
        assert_eq!(w.last().unwrap().open_time, minute(0));
    }

    #[test]
    fn first_rollover_closes_with_opening_tick() {
        let mut w = CandleWindow::new(3);
        w.update(42.0, minute(0)).unwrap();
        w.update(50.0, minute(1)).unwrap();
        let first = w.candles().next().unwrap();
        assert!((first.close - 42.0).abs() < f64::EPSILON);
        assert!((w.min().unwrap() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_window_has_no_extremes() {
        let w = CandleWindow::new(2);
        assert!(matches!(w.max(), Err(AppError::EmptyWindow)));
        assert!(matches!(w.min(), Err(AppError::EmptyWindow)));
        assert!(matches!(w.ratio(), Err(AppError::EmptyWindow)));
        assert!(w.is_empty());
    }

    #[test]
    fn stale_tick_leaves_state_untouched() {
        let mut w = CandleWindow::new(3);
        w.update(10.0, minute(5)).unwrap();
        w.update(11.0, minute(6)).unwrap();

        let err = w.update(99.0, minute(5)).unwrap_err();
        assert!(matches!(err, AppError::StaleTick { .. }));
        assert_eq!(w.len(), 2);
        assert_eq!(w.last().unwrap().open_time, minute(6));
        assert!((w.max().unwrap() - 11.0).abs() < f64::EPSILON);

        // The next boundary still finalizes with the last accepted price.
        w.update(12.0, minute(7)).unwrap();
        let closes: Vec<f64> = w.candles().map(|c| c.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    #[should_panic(expected = "window capacity must be > 0")]
    fn rejects_zero_capacity() {
        let _ = CandleWindow::new(0);
    }
}
