pub mod client;
pub mod ndjson;

pub use client::{LichessClient, LichessConfig};
pub use ndjson::NdjsonStream;
