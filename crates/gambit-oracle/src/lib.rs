pub mod mock;
pub mod openrouter;
pub mod prompt;

pub use openrouter::{OpenRouterConfig, OpenRouterOracle};
