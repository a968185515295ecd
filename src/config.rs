//! Command line / environment configuration.
//!
//! Every flag can also be set through the environment (or a `.env` file, loaded
//! by the binary before parsing).

use std::time::Duration;

use clap::Parser;

use crate::agent::LoopConfig;
use crate::hands::ChromeLauncher;

#[derive(Debug, Clone, Parser)]
#[command(name = "agent", about = "Browser automation agent server")]
pub struct Config {
    /// OpenRouter (or compatible) API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "OPENROUTER_MODEL", default_value = "google/gemini-2.0-flash-001")]
    pub model: String,

    /// Override the chat completions endpoint.
    #[arg(long, env = "OPENROUTER_URL")]
    pub oracle_url: Option<String>,

    #[arg(long, env = "ORACLE_TIMEOUT_SECS", default_value_t = 60)]
    pub oracle_timeout_secs: u64,

    #[arg(long, env = "BROWSER_HEADLESS", default_value_t = false, action = clap::ArgAction::Set)]
    pub headless: bool,

    #[arg(long, env = "BROWSER_WIDTH", default_value_t = 1280)]
    pub width: u32,

    #[arg(long, env = "BROWSER_HEIGHT", default_value_t = 900)]
    pub height: u32,

    #[arg(long, env = "MAX_ITERATIONS", default_value_t = 30)]
    pub max_iterations: u32,

    #[arg(long, env = "MAX_CONSECUTIVE_ORACLE_ERRORS", default_value_t = 5)]
    pub max_consecutive_oracle_errors: u32,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Origin allowed to call the API from a browser.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,
}

impl Config {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_iterations: self.max_iterations,
            max_consecutive_oracle_errors: self.max_consecutive_oracle_errors.max(1),
            ..LoopConfig::default()
        }
    }

    pub fn launcher(&self) -> ChromeLauncher {
        ChromeLauncher {
            headless: self.headless,
            width: self.width,
            height: self.height,
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "agent",
            "--api-key",
            "k",
            "--headless",
            "true",
            "--max-iterations",
            "12",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
        ])
        .unwrap();

        assert!(config.headless);
        assert_eq!(config.addr(), "0.0.0.0:9000");
        let loop_config = config.loop_config();
        assert_eq!(loop_config.max_iterations, 12);
        assert_eq!(loop_config.max_consecutive_oracle_errors, 5);
        assert_eq!(config.launcher().width, 1280);
    }
}
