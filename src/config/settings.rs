use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::util::paths::config_path;

use super::keys::{parse_hotkey_notation, HotkeyBinding};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Orchestrator behavior
    pub playback: PlaybackConfig,
    /// Page agent behavior
    pub agent: AgentConfig,
    /// Relay keep-alive behavior
    pub keepalive: KeepAliveConfig,
    /// Simulated fabric used by `demoflow play`
    pub rehearsal: RehearsalConfig,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// First auxiliary page of every run
    pub overview_url: String,
    /// Second auxiliary page, listing the script's personas
    pub personas_url: String,
    /// Page created after the last step; empty disables it
    pub completion_url: String,
    /// Clear the previous run's pages before playing
    pub clear_before_play: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            overview_url: "demoflow://overview".to_string(),
            personas_url: "demoflow://personas".to_string(),
            completion_url: "demoflow://overview?complete=true".to_string(),
            clear_before_play: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Fixed backoff between id resolution / channel attempts
    pub retry_delay: Duration,
    /// Modifier prefix for the canned-text hotkey
    pub hotkey: HotkeyBinding,
    /// Dismissing the overlay also deletes the page's assignment
    pub forget_on_dismiss: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            hotkey: HotkeyBinding::default(),
            forget_on_dismiss: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeepAliveConfig {
    pub enabled: bool,
    /// Interval between no-op pings
    pub interval: Duration,
    /// Host idle timeout
    pub max_idle: Duration,
    /// How long before `max_idle` the channel re-arms
    pub rearm_margin: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(20),
            max_idle: Duration::from_secs(300),
            rearm_margin: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RehearsalConfig {
    pub load_delay: Duration,
    pub load_jitter: Duration,
}

impl Default for RehearsalConfig {
    fn default() -> Self {
        Self {
            load_delay: Duration::from_millis(150),
            load_jitter: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlPlaybackConfig {
    pub overview_url: Option<String>,
    pub personas_url: Option<String>,
    pub completion_url: Option<String>,
    pub clear_before_play: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAgentConfig {
    pub retry_delay_ms: Option<u64>,
    pub hotkey: Option<String>,
    pub forget_on_dismiss: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlKeepAliveConfig {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
    pub max_idle_ms: Option<u64>,
    pub rearm_margin_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRehearsalConfig {
    pub load_delay_ms: Option<u64>,
    pub load_jitter_ms: Option<u64>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub playback: Option<TomlPlaybackConfig>,
    pub agent: Option<TomlAgentConfig>,
    pub keepalive: Option<TomlKeepAliveConfig>,
    pub rehearsal: Option<TomlRehearsalConfig>,
}

impl Config {
    /// Load configuration from the default location, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from `path`; missing or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Config::default(),
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => Config::default().merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config");
                Config::default()
            }
        }
    }

    /// Overlay the values present in `toml_config` onto `self`
    pub fn merge(mut self, toml_config: TomlConfig) -> Self {
        if let Some(playback) = toml_config.playback {
            if let Some(url) = playback.overview_url {
                self.playback.overview_url = url;
            }
            if let Some(url) = playback.personas_url {
                self.playback.personas_url = url;
            }
            if let Some(url) = playback.completion_url {
                self.playback.completion_url = url;
            }
            if let Some(clear) = playback.clear_before_play {
                self.playback.clear_before_play = clear;
            }
        }

        if let Some(agent) = toml_config.agent {
            if let Some(ms) = agent.retry_delay_ms {
                self.agent.retry_delay = Duration::from_millis(ms);
            }
            if let Some(notation) = agent.hotkey {
                match parse_hotkey_notation(&notation) {
                    Ok(binding) => self.agent.hotkey = binding,
                    Err(e) => {
                        tracing::warn!(hotkey = %notation, error = %e, "Ignoring invalid hotkey");
                    }
                }
            }
            if let Some(forget) = agent.forget_on_dismiss {
                self.agent.forget_on_dismiss = forget;
            }
        }

        if let Some(keepalive) = toml_config.keepalive {
            if let Some(enabled) = keepalive.enabled {
                self.keepalive.enabled = enabled;
            }
            if let Some(ms) = keepalive.interval_ms {
                self.keepalive.interval = Duration::from_millis(ms.max(1));
            }
            if let Some(ms) = keepalive.max_idle_ms {
                self.keepalive.max_idle = Duration::from_millis(ms);
            }
            if let Some(ms) = keepalive.rearm_margin_ms {
                self.keepalive.rearm_margin = Duration::from_millis(ms);
            }
            if self.keepalive.rearm_margin >= self.keepalive.max_idle {
                tracing::warn!(
                    rearm_margin_ms = self.keepalive.rearm_margin.as_millis() as u64,
                    max_idle_ms = self.keepalive.max_idle.as_millis() as u64,
                    "Re-arm margin must be shorter than the idle timeout, using half of it"
                );
                self.keepalive.rearm_margin = self.keepalive.max_idle / 2;
            }
        }

        if let Some(rehearsal) = toml_config.rehearsal {
            if let Some(ms) = rehearsal.load_delay_ms {
                self.rehearsal.load_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = rehearsal.load_jitter_ms {
                self.rehearsal.load_jitter = Duration::from_millis(ms);
            }
        }

        self
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }
}
