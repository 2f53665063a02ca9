//! Command-line and environment configuration.

use clap::Parser;
use secrecy::SecretString;
use tracing::Level;

use gambit_engine::EngineConfig;
use gambit_lichess::LichessConfig;
use gambit_oracle::OpenRouterConfig;
use gambit_telemetry::{LogFormat, TelemetryConfig};

/// Lichess bot that asks a language model for its moves.
#[derive(Parser, Clone)]
#[command(name = "gambit")]
pub struct Args {
    /// Lichess API token with the bot:play scope
    #[arg(long, env = "LICHESS_TOKEN", hide_env_values = true, value_parser = non_empty)]
    pub lichess_token: String,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, value_parser = non_empty)]
    pub openrouter_api_key: String,

    /// Port for the status server
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    #[arg(long, env = "OPENROUTER_MODEL", default_value = gambit_oracle::openrouter::DEFAULT_MODEL)]
    pub openrouter_model: String,

    #[arg(long, env = "LICHESS_URL", default_value = gambit_lichess::client::DEFAULT_BASE_URL)]
    pub lichess_url: String,

    #[arg(long, env = "OPENROUTER_URL", default_value = gambit_oracle::openrouter::DEFAULT_BASE_URL)]
    pub openrouter_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    /// Log output format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,

    /// Move played without consulting the model when the bot opens as white
    #[arg(long, env = "OPENING_MOVE", default_value = gambit_engine::config::DEFAULT_OPENING_MOVE)]
    pub opening_move: String,

    /// Submissions per turn before giving up
    #[arg(long, env = "MAX_MOVE_ATTEMPTS", default_value_t = gambit_engine::config::DEFAULT_MAX_ATTEMPTS)]
    pub max_move_attempts: u32,
}

fn non_empty(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Err("must not be empty".into())
    } else {
        Ok(trimmed.to_string())
    }
}

impl Args {
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            module_levels: Vec::new(),
            format: self.log_format,
        }
    }

    pub fn lichess(&self) -> LichessConfig {
        let mut config = LichessConfig::new(SecretString::from(self.lichess_token.clone()));
        config.base_url = self.lichess_url.clone();
        config
    }

    pub fn oracle(&self) -> OpenRouterConfig {
        let mut config = OpenRouterConfig::new(SecretString::from(self.openrouter_api_key.clone()));
        config.model = self.openrouter_model.clone();
        config.base_url = self.openrouter_url.clone();
        config
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            opening_move: self.opening_move.clone(),
            max_attempts: self.max_move_attempts,
            ..EngineConfig::default()
        }
    }
}
