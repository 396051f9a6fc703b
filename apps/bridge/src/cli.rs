use std::path::PathBuf;

use clap::Parser;

/// Values left unset here fall back to the config file, then to defaults.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chat-obs-bridge",
    version,
    about = "Switch between OBS camera layers from Twitch chat"
)]
pub struct Args {
    /// Client id of the Twitch application the oauth token was issued to
    #[arg(long, env = "SECRET_TWITCH_APP_ID", hide_env_values = true)]
    pub twitch_app_id: Option<String>,

    /// User access token with the chat:read scope; chat is read anonymously without one
    #[arg(long, env = "SECRET_TWITCH_OAUTH_TOKEN", hide_env_values = true)]
    pub twitch_oauth_token: Option<String>,

    /// Twitch channel whose chat drives the switching
    #[arg(long, env = "TWITCH_CHANNEL")]
    pub twitch_channel: Option<String>,

    /// Websocket url of the OBS instance [default: ws://localhost:4444]
    #[arg(long, env = "OBS_URL")]
    pub obs_url: Option<String>,

    /// obs-websocket server password
    #[arg(long, env = "SECRET_OBS_PASSWORD", hide_env_values = true)]
    pub obs_password: Option<String>,

    /// TOML file with managed objects, triggers and retry settings
    #[arg(long, env = "BRIDGE_CONFIG", default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
