pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod lifecycle;
pub mod metrics;
pub mod request;
