use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::AppError;

/// Parameters forwarded untouched to the alert service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertParams {
    pub sound_id: u32,
    pub level: u32,
    pub repeat: u32,
}

/// Outbound alert action.
///
/// Implementations report failures, but callers treat the alert as best
/// effort and never retry.
pub trait AlertSink: Send + Sync + 'static {
    fn send_alert(
        &self,
        params: &AlertParams,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Posts alert schedules to a waker service (`POST /api/schedules`).
#[derive(Debug, Clone)]
pub struct WakerClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl WakerClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, AppError> {
        // The waker lives on the local network; system proxies never apply.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { http, endpoint })
    }
}

impl AlertSink for WakerClient {
    fn send_alert(
        &self,
        params: &AlertParams,
    ) -> impl Future<Output = Result<(), AppError>> + Send {
        let request = self.http.post(self.endpoint.clone()).json(params);
        async move {
            let resp = request.send().await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            Err(AppError::AlertDispatch {
                status: status.as_u16(),
                body,
            })
        }
    }
}
