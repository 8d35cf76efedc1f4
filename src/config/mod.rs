pub mod keys;
mod settings;

pub use keys::{parse_hotkey_notation, HotkeyBinding, KeyParseError, KeyPress, Modifiers};
pub use settings::{
    AgentConfig, Config, KeepAliveConfig, PlaybackConfig, RehearsalConfig, EXAMPLE_CONFIG,
};
