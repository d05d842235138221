pub mod types;
pub mod ws;

pub use types::parse_last_price;
pub use ws::FeedWsClient;
