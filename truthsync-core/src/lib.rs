pub mod backend;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod retry;
pub mod stream;
pub mod telemetry;
