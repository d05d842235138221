use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::alert::{AlertParams, AlertSink};
use crate::config::Config;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::tick::{truncate_to_minute, Tick};
use crate::window::{CandleWindow, WindowUpdate};

/// Immutable settings the processor is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    pub minute_range: usize,
    /// Alert fires when `max / min` is strictly greater than this.
    pub ratio: f64,
    /// Hold alerts back until the window holds `minute_range` candles.
    pub require_full_window: bool,
    pub alert: AlertParams,
}

impl ProcessorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            minute_range: config.window.minute_range,
            ratio: config.window.ratio,
            require_full_window: config.window.require_full_window,
            alert: config.alert.params(),
        }
    }
}

/// Result of processing one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickDecision {
    pub price: f64,
    pub minute: DateTime<Utc>,
    pub max: f64,
    pub min: f64,
    pub ratio: f64,
    pub window_len: usize,
    pub window_full: bool,
    pub alerted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub capacity: usize,
    pub candles: Vec<Candle>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

#[derive(Debug)]
enum ProcessorMsg {
    Tick {
        tick: Tick,
        reply: Option<oneshot::Sender<Result<TickDecision, AppError>>>,
    },
    Snapshot {
        reply: oneshot::Sender<WindowSnapshot>,
    },
}

/// Owns the candle window and decides on alerts, one tick at a time.
///
/// Run it with [`TickProcessor::spawn`] to get a single-owner task. Every
/// message is handled to completion, including the alert call, before the
/// next one is read, so update, read and alert form one atomic step.
pub struct TickProcessor<A: AlertSink> {
    settings: ProcessorSettings,
    window: CandleWindow,
    sink: A,
}

impl<A: AlertSink> TickProcessor<A> {
    pub fn new(settings: ProcessorSettings, sink: A) -> Self {
        let window = CandleWindow::new(settings.minute_range);
        Self {
            settings,
            window,
            sink,
        }
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub async fn on_tick(
        &mut self,
        price: f64,
        arrival: DateTime<Utc>,
    ) -> Result<TickDecision, AppError> {
        let minute = truncate_to_minute(arrival);

        match self.window.update(price, minute) {
            Ok(WindowUpdate::RolledOver { evicted }) => {
                tracing::debug!(
                    %minute,
                    window_len = self.window.len(),
                    evicted = ?evicted.as_ref().map(|c| c.open_time),
                    closed = ?self.window.candles().rev().nth(1).map(|c| c.close),
                    "Window rolled over"
                );
            }
            Ok(WindowUpdate::Opened | WindowUpdate::Extended) => {}
            Err(e) => {
                tracing::warn!(price, %minute, error = %e, "Rejected tick");
                return Err(e);
            }
        }

        let max = self.window.max()?;
        let min = self.window.min()?;
        let ratio = self.window.ratio()?;
        let window_full = self.window.is_full();
        let triggered =
            ratio > self.settings.ratio && (window_full || !self.settings.require_full_window);

        tracing::debug!(
            price,
            %minute,
            max,
            min,
            ratio,
            window_len = self.window.len(),
            "Processed tick"
        );

        if triggered {
            tracing::info!(
                ratio,
                threshold = self.settings.ratio,
                max,
                min,
                "Price swing over threshold, sending alert"
            );
            if let Err(e) = self.sink.send_alert(&self.settings.alert).await {
                tracing::error!(error = %e, "Alert dispatch failed");
            }
        }

        Ok(TickDecision {
            price,
            minute,
            max,
            min,
            ratio,
            window_len: self.window.len(),
            window_full,
            alerted: triggered,
        })
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            capacity: self.window.capacity(),
            candles: self.window.candles().cloned().collect(),
            max: self.window.max().ok(),
            min: self.window.min().ok(),
        }
    }

    /// Move the processor into its own task.
    ///
    /// The task ends when every handle is dropped or `shutdown` flips.
    pub fn spawn(
        self,
        inbox_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (TickProcessorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(inbox_capacity);
        let task = tokio::spawn(self.run(rx, shutdown));
        (TickProcessorHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<ProcessorMsg>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(ProcessorMsg::Tick { tick, reply }) => {
                            let result = self.on_tick(tick.price, tick.received_at).await;
                            if let Some(reply) = reply {
                                let _ = reply.send(result);
                            }
                        }
                        Some(ProcessorMsg::Snapshot { reply }) => {
                            let _ = reply.send(self.snapshot());
                        }
                        None => {
                            tracing::info!("Tick channel closed, processor exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Tick processor shutting down");
                    break;
                }
            }
        }
    }
}

/// Cloneable front door to a spawned [`TickProcessor`].
#[derive(Debug, Clone)]
pub struct TickProcessorHandle {
    tx: mpsc::Sender<ProcessorMsg>,
}

impl TickProcessorHandle {
    /// Process a tick and wait for the decision.
    pub async fn on_tick(
        &self,
        price: f64,
        arrival: DateTime<Utc>,
    ) -> Result<TickDecision, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ProcessorMsg::Tick {
                tick: Tick::new(price, arrival),
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| AppError::ProcessorClosed)?;
        reply_rx.await.map_err(|_| AppError::ProcessorClosed)?
    }

    /// Queue a tick without waiting for its decision.
    ///
    /// Waits for inbox space when the processor is busy (e.g. while an alert
    /// is in flight), so ticks are delayed rather than lost.
    pub async fn send(&self, tick: Tick) -> Result<(), AppError> {
        self.tx
            .send(ProcessorMsg::Tick { tick, reply: None })
            .await
            .map_err(|_| AppError::ProcessorClosed)
    }

    pub async fn snapshot(&self) -> Result<WindowSnapshot, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ProcessorMsg::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| AppError::ProcessorClosed)?;
        reply_rx.await.map_err(|_| AppError::ProcessorClosed)
    }
}
