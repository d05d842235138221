use serde::Deserialize;

use crate::error::AppError;

/// Accept prices sent either as JSON numbers or numeric strings.
pub fn string_or_number_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    match v {
        serde_json::Value::String(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

/// One frame of the public depth/trade stream. Only the last trade price is
/// consumed; the order book and trade lists are ignored.
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    pub last_price: LastPrice,
}

#[derive(Debug, Deserialize)]
pub struct LastPrice {
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub price: f64,
}

/// Extract the last trade price from a raw text frame.
pub fn parse_last_price(text: &str) -> Result<f64, AppError> {
    let msg: StreamMessage = serde_json::from_str(text)?;
    if !msg.last_price.price.is_finite() || msg.last_price.price <= 0.0 {
        return Err(AppError::WebSocket(format!(
            "non-positive last price {}",
            msg.last_price.price
        )));
    }
    Ok(msg.last_price.price)
}
