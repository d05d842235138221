use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite;

use super::types::parse_last_price;
use crate::error::AppError;
use crate::model::tick::Tick;
use crate::processor::TickProcessorHandle;

/// Exponential backoff for reconnection.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

enum SessionEnd {
    Shutdown,
    ProcessorGone,
}

/// Push-stream client. Connection failures are logged and retried; they
/// never reach the processor.
#[derive(Debug, Clone)]
pub struct FeedWsClient {
    url: String,
}

impl FeedWsClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// Connect and forward ticks to `processor` until shutdown, reconnecting
    /// with backoff on any transport error.
    pub async fn connect_and_run(
        &self,
        processor: TickProcessorHandle,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.connect_once(&processor, &mut shutdown, &mut backoff).await {
                Ok(SessionEnd::Shutdown) => {
                    tracing::info!(url = %self.url, "Disconnected from stream");
                    break;
                }
                Ok(SessionEnd::ProcessorGone) => {
                    tracing::info!("Tick processor stopped, closing stream");
                    break;
                }
                Err(e) => {
                    tracing::error!(url = %self.url, error = %format!("{:#}", e), "Stream error");

                    let delay = backoff.next_delay();
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to stream"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        processor: &TickProcessorHandle,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<SessionEnd> {
        tracing::debug!(url = %self.url, "Connecting to stream");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;

        tracing::info!(url = %self.url, "Connected to stream");
        backoff.reset();

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match parse_last_price(&text) {
                                Ok(price) => {
                                    // Awaiting here stops reading the socket
                                    // while the processor is busy.
                                    if processor.send(Tick::now(price)).await.is_err() {
                                        return Ok(SessionEnd::ProcessorGone);
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "Failed to parse stream message");
                                }
                            }
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            tracing::info!(?frame, "Server closed stream");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(AppError::WebSocket(format!("read error: {}", e)).into());
                        }
                        None => {
                            return Err(AppError::WebSocket("stream ended".to_string()).into());
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap_and_resets() {
        let mut b = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_secs(2));
        assert_eq!(b.next_delay(), Duration::from_secs(4));
        assert_eq!(b.next_delay(), Duration::from_secs(5));
        assert_eq!(b.next_delay(), Duration::from_secs(5));
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }
}
