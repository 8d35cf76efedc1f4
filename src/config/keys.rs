//! Hotkey notation for the canned-text side channel
//!
//! The hotkey is a modifier prefix written in vim-style notation (`C-S`, `M`,
//! `C-M`); pressing it together with a digit 1-9 selects the persona's Nth text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing hotkey notation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("Empty key notation")]
    Empty,
    #[error("Unknown modifier: {0}")]
    UnknownModifier(String),
    #[error("Hotkey needs at least one modifier")]
    NoModifier,
}

/// Modifier keys held during a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub fn ctrl_shift() -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("C");
        }
        if self.alt {
            parts.push("M");
        }
        if self.shift {
            parts.push("S");
        }
        if self.meta {
            parts.push("D");
        }
        write!(f, "{}", parts.join("-"))
    }
}

/// A key press delivered to a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub modifiers: Modifiers,
    pub key: char,
}

impl KeyPress {
    pub fn new(modifiers: Modifiers, key: char) -> Self {
        Self { modifiers, key }
    }
}

/// Modifier prefix that turns digits 1-9 into canned-text hotkeys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub modifiers: Modifiers,
}

impl HotkeyBinding {
    pub fn new(modifiers: Modifiers) -> Self {
        Self { modifiers }
    }

    /// Digit selected by `press`, if it is exactly this hotkey plus 1-9
    pub fn digit_for(&self, press: &KeyPress) -> Option<u8> {
        if press.modifiers != self.modifiers {
            return None;
        }
        match press.key {
            '1'..='9' => press.key.to_digit(10).map(|d| d as u8),
            _ => None,
        }
    }
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self::new(Modifiers::ctrl_shift())
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-<1-9>", self.modifiers)
    }
}

impl FromStr for HotkeyBinding {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hotkey_notation(s)
    }
}

/// Parse a modifier prefix such as `C-S` or `M`
///
/// Supported modifiers:
/// - `C` for Ctrl
/// - `M` for Alt (Meta)
/// - `S` for Shift
/// - `D` for Cmd/Super
pub fn parse_hotkey_notation(s: &str) -> Result<HotkeyBinding, KeyParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(KeyParseError::Empty);
    }

    let mut modifiers = Modifiers::NONE;
    for part in s.split('-') {
        match part.trim() {
            "C" => modifiers.ctrl = true,
            "M" => modifiers.alt = true,
            "S" => modifiers.shift = true,
            "D" => modifiers.meta = true,
            other => return Err(KeyParseError::UnknownModifier(other.to_string())),
        }
    }

    if modifiers.is_empty() {
        return Err(KeyParseError::NoModifier);
    }
    Ok(HotkeyBinding::new(modifiers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers() {
        let binding = parse_hotkey_notation("C-S").unwrap();
        assert_eq!(binding.modifiers, Modifiers::ctrl_shift());

        let binding = parse_hotkey_notation(" M-D ").unwrap();
        assert!(binding.modifiers.alt && binding.modifiers.meta);
        assert!(!binding.modifiers.ctrl);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_hotkey_notation(""), Err(KeyParseError::Empty));
        assert_eq!(
            parse_hotkey_notation("C-x"),
            Err(KeyParseError::UnknownModifier("x".into()))
        );
        assert!("Hyper".parse::<HotkeyBinding>().is_err());
    }

    #[test]
    fn test_digit_for_requires_exact_modifiers() {
        let binding = HotkeyBinding::default();

        assert_eq!(
            binding.digit_for(&KeyPress::new(Modifiers::ctrl_shift(), '3')),
            Some(3)
        );
        assert_eq!(
            binding.digit_for(&KeyPress::new(Modifiers::ctrl_shift(), '0')),
            None
        );
        assert_eq!(
            binding.digit_for(&KeyPress::new(Modifiers::ctrl_shift(), 'a')),
            None
        );
        let ctrl_only = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        assert_eq!(binding.digit_for(&KeyPress::new(ctrl_only, '3')), None);
        assert_eq!(binding.digit_for(&KeyPress::new(Modifiers::NONE, '3')), None);
    }

    #[test]
    fn test_display_roundtrips_notation() {
        let binding = parse_hotkey_notation("C-M").unwrap();
        assert_eq!(binding.modifiers.to_string(), "C-M");
        assert_eq!(binding.to_string(), "C-M-<1-9>");
    }
}
