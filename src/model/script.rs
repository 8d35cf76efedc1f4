//! Demo script: the declarative walkthrough a run plays back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of canned text snippets a persona can carry (bound to hotkeys 1-9)
pub const MAX_FAKE_TEXTS: usize = 9;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Step {step} references unknown persona '{persona}'")]
    UnknownPersona { step: usize, persona: PersonaKey },
    #[error("Persona '{persona}' has {count} canned texts (at most {MAX_FAKE_TEXTS} allowed)")]
    TooManyTexts { persona: PersonaKey, count: usize },
    #[error("Malformed script: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Key of a persona inside `DemoScript::personas`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaKey(String);

impl PersonaKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonaKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Visual theme of the overlay (e.g. "light", "dark", a brand name)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme(String);

impl Theme {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tab group color palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabColor {
    Grey,
    Blue,
    Red,
    Yellow,
    #[default]
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl TabColor {
    pub const ALL: [TabColor; 9] = [
        TabColor::Grey,
        TabColor::Blue,
        TabColor::Red,
        TabColor::Yellow,
        TabColor::Green,
        TabColor::Pink,
        TabColor::Purple,
        TabColor::Cyan,
        TabColor::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabColor::Grey => "grey",
            TabColor::Blue => "blue",
            TabColor::Red => "red",
            TabColor::Yellow => "yellow",
            TabColor::Green => "green",
            TabColor::Pink => "pink",
            TabColor::Purple => "purple",
            TabColor::Cyan => "cyan",
            TabColor::Orange => "orange",
        }
    }

    /// Parse a palette name; anything outside the palette maps to the default (green)
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s.trim())
            .unwrap_or_default()
    }
}

impl fmt::Display for TabColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named identity rendered as an overlay on visited pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_ref: Option<String>,
    #[serde(default)]
    pub fake_text: Vec<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            picture_ref: None,
            fake_text: Vec::new(),
        }
    }

    pub fn with_fake_text(mut self, texts: Vec<String>) -> Self {
        self.fake_text = texts;
        self
    }

    pub fn with_picture(mut self, picture_ref: impl Into<String>) -> Self {
        self.picture_ref = Some(picture_ref.into());
        self
    }

    /// Canned text bound to hotkey digit `digit` (1-9)
    pub fn canned_text(&self, digit: u8) -> Option<&str> {
        if !(1..=9).contains(&digit) {
            return None;
        }
        self.fake_text
            .get(usize::from(digit - 1))
            .map(String::as_str)
    }
}

/// One ordered unit of the script
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaKey>,
    #[serde(default)]
    pub icon: String,
    /// Authored color name; values outside the palette fall back to green
    #[serde(default)]
    pub tab_color: String,
    #[serde(default)]
    pub incognito: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl Step {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_persona(mut self, key: impl Into<PersonaKey>) -> Self {
        self.persona = Some(key.into());
        self
    }

    pub fn with_tab_color(mut self, color: impl Into<String>) -> Self {
        self.tab_color = color.into();
        self
    }

    pub fn incognito(mut self) -> Self {
        self.incognito = true;
        self
    }

    pub fn group_color(&self) -> TabColor {
        TabColor::parse(&self.tab_color)
    }

    /// Whether this step gets its own isolated window
    pub fn needs_isolated_window(&self) -> bool {
        self.incognito && !self.urls.is_empty()
    }
}

/// The user-authored walkthrough; immutable once a run starts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoScript {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub personas: BTreeMap<PersonaKey, Persona>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl DemoScript {
    /// Parse and validate a script from JSON
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: DemoScript = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    pub fn persona(&self, key: &PersonaKey) -> Option<&Persona> {
        self.personas.get(key)
    }

    /// Check the cross-references a run relies on
    pub fn validate(&self) -> Result<(), ScriptError> {
        for (key, persona) in &self.personas {
            if persona.fake_text.len() > MAX_FAKE_TEXTS {
                return Err(ScriptError::TooManyTexts {
                    persona: key.clone(),
                    count: persona.fake_text.len(),
                });
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(key) = &step.persona {
                if !self.personas.contains_key(key) {
                    return Err(ScriptError::UnknownPersona {
                        step: index,
                        persona: key.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
