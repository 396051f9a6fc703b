use std::{collections::HashSet, fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::{bail, Context};
use regex::RegexBuilder;
use scene_client::RetryPolicy;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::cli::Args;

pub const DEFAULT_OBS_URL: &str = "ws://localhost:4444";
pub const DEFAULT_MANAGED_OBJECTS: [&str; 4] = ["[CAM 1]", "[CAM 2]", "[CAM 3]", "[CAM 4]"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriggerConfig {
    pub pattern: String,
    pub target: String,
}

impl TriggerConfig {
    /// Fires when the object's name appears literally anywhere in a message.
    pub fn literal(target: &str) -> Self {
        Self {
            pattern: regex::escape(target),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObsSection {
    pub url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ObsSection {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwitchSection {
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_secs: policy.delay.as_secs(),
        }
    }
}

/// Contents of the optional TOML config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub managed_objects: Vec<String>,
    /// Empty means one literal-name trigger per managed object.
    pub triggers: Vec<TriggerConfig>,
    pub obs: ObsSection,
    pub twitch: TwitchSection,
    pub retry: RetrySection,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            managed_objects: DEFAULT_MANAGED_OBJECTS.map(String::from).to_vec(),
            triggers: Vec::new(),
            obs: ObsSection::default(),
            twitch: TwitchSection::default(),
            retry: RetrySection::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub obs_url: String,
    pub obs_password: Option<String>,
    pub obs_request_timeout: Duration,
    pub twitch_channel: String,
    pub twitch_app_id: Option<String>,
    pub twitch_oauth_token: Option<String>,
    pub managed_objects: Vec<String>,
    pub triggers: Vec<TriggerConfig>,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.managed_objects.is_empty() {
            bail!("at least one managed object is required");
        }
        let mut seen = HashSet::new();
        for name in &self.managed_objects {
            if name.trim().is_empty() {
                bail!("managed object names must not be empty");
            }
            if !seen.insert(name.as_str()) {
                bail!("managed object '{name}' is listed twice");
            }
        }

        for trigger in &self.triggers {
            if !seen.contains(trigger.target.as_str()) {
                bail!(
                    "trigger '{}' targets '{}', which is not a managed object",
                    trigger.pattern,
                    trigger.target
                );
            }
            RegexBuilder::new(&trigger.pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid trigger pattern '{}'", trigger.pattern))?;
        }

        let url = Url::parse(&self.obs_url)
            .with_context(|| format!("invalid OBS url '{}'", self.obs_url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("OBS url '{}' must use ws:// or wss://", self.obs_url);
        }

        if self.twitch_channel.trim().trim_start_matches('#').is_empty() {
            bail!("a Twitch channel is required (--twitch-channel or TWITCH_CHANNEL)");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Read `path`; a missing file yields the defaults.
pub fn load_file(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "config: no config file; using defaults");
            return Ok(FileConfig::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    toml::from_str(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

/// Command line and environment win over the file, the file over defaults.
pub fn resolve(args: &Args, file: FileConfig) -> anyhow::Result<Settings> {
    let triggers = if file.triggers.is_empty() {
        file.managed_objects
            .iter()
            .map(|name| TriggerConfig::literal(name))
            .collect()
    } else {
        file.triggers
    };

    let settings = Settings {
        obs_url: args
            .obs_url
            .clone()
            .or(file.obs.url)
            .unwrap_or_else(|| DEFAULT_OBS_URL.to_string()),
        obs_password: args.obs_password.clone().filter(|p| !p.is_empty()),
        obs_request_timeout: Duration::from_secs(file.obs.request_timeout_secs.max(1)),
        twitch_channel: args
            .twitch_channel
            .clone()
            .or(file.twitch.channel)
            .unwrap_or_default(),
        twitch_app_id: args.twitch_app_id.clone().filter(|id| !id.is_empty()),
        twitch_oauth_token: args.twitch_oauth_token.clone().filter(|t| !t.is_empty()),
        managed_objects: file.managed_objects,
        triggers,
        retry: RetryPolicy {
            max_attempts: file.retry.max_attempts,
            delay: Duration::from_secs(file.retry.delay_secs),
        },
    };
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let file = load_file(&args.config)?;
    resolve(args, file)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
