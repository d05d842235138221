use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("candle window is empty")]
    EmptyWindow,

    #[error("stale tick: minute {observed} is before last observed minute {last}")]
    StaleTick {
        observed: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("alert dispatch failed (status {status}): {body}")]
    AlertDispatch { status: u16, body: String },

    #[error("tick processor is not running")]
    ProcessorClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
