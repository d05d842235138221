pub mod alert;
pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod processor;
pub mod window;
