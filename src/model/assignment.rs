//! Persona assignment entries stored in the AssignmentMap.

use serde::{Deserialize, Serialize};

use super::script::{DemoScript, Persona, PersonaKey, ScriptError, Step, Theme, MAX_FAKE_TEXTS};

/// What a page agent renders: the persona due on a page plus the run's theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEntry {
    pub persona: Persona,
    pub theme: Theme,
}

impl AssignmentEntry {
    pub fn new(persona: Persona, theme: Theme) -> Self {
        Self { persona, theme }
    }

    /// Entry due for the pages of `step`, if the step carries a persona
    pub fn for_step(script: &DemoScript, step: &Step) -> Option<Self> {
        let key = step.persona.as_ref()?;
        let persona = script.persona(key)?;
        Some(Self::new(persona.clone(), script.theme.clone()))
    }

    /// Reject entries that a page agent could not render faithfully
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.persona.fake_text.len() > MAX_FAKE_TEXTS {
            return Err(ScriptError::TooManyTexts {
                persona: PersonaKey::new(self.persona.name.clone()),
                count: self.persona.fake_text.len(),
            });
        }
        Ok(())
    }
}
