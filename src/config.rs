use clap::Parser;

/// Environment variable holding the agent credential.
pub const API_KEY_VAR: &str = "NOVA_ACT_API_KEY";

#[derive(Debug, Parser)]
#[command(name = "nova-act-api", about = "HTTP front end for the web automation agent")]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8001)]
    pub port: u16,
}

/// Process-wide configuration, read once at startup and immutable afterwards.
/// A missing credential is not fatal at startup; it is reported per request.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env(cli: Cli) -> Self {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            api_key,
            port: cli.port,
        }
    }
}
