//! The slice of a visited page the agent touches: overlay nodes and the focused field

use crate::model::{AssignmentEntry, Persona, Theme};
use crate::relay::Visibility;

/// Rendered persona overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    pub persona: Persona,
    pub theme: Theme,
}

impl From<&AssignmentEntry> for OverlayView {
    fn from(entry: &AssignmentEntry) -> Self {
        Self {
            persona: entry.persona.clone(),
            theme: entry.theme.clone(),
        }
    }
}

/// An editable element with a selection, in character offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editable {
    text: String,
    selection: (usize, usize),
}

impl Editable {
    /// Field holding `text` with the caret at the end
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.chars().count();
        Self {
            text,
            selection: (end, end),
        }
    }

    /// Select `[start, end)`; bounds are clamped to the text
    pub fn with_selection(mut self, start: usize, end: usize) -> Self {
        let len = self.text.chars().count();
        let (start, end) = (start.min(len), end.min(len));
        self.selection = (start.min(end), start.max(end));
        self
    }

    pub fn with_caret(self, at: usize) -> Self {
        self.with_selection(at, at)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> (usize, usize) {
        self.selection
    }

    /// Replace the selection with `insert`, leaving the caret after it
    pub fn insert(&mut self, insert: &str) {
        let (start, end) = self.selection;
        let start_byte = byte_offset(&self.text, start);
        let end_byte = byte_offset(&self.text, end);
        self.text.replace_range(start_byte..end_byte, insert);

        let caret = start + insert.chars().count();
        self.selection = (caret, caret);
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Page document as seen by the agent
#[derive(Debug, Default)]
pub struct PageDom {
    overlay_nodes: Vec<OverlayView>,
    overlays_built: u32,
    focused: Option<Editable>,
    visibility: Visibility,
}

impl PageDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the overlay unless one is already in the page. Returns whether one was built.
    pub fn render(&mut self, view: OverlayView) -> bool {
        if !self.overlay_nodes.is_empty() {
            return false;
        }
        self.overlay_nodes.push(view);
        self.overlays_built += 1;
        true
    }

    /// Remove the overlay. Returns whether one was present.
    pub fn remove_overlay(&mut self) -> bool {
        let present = !self.overlay_nodes.is_empty();
        self.overlay_nodes.clear();
        present
    }

    pub fn overlay(&self) -> Option<&OverlayView> {
        self.overlay_nodes.first()
    }

    pub fn has_overlay(&self) -> bool {
        !self.overlay_nodes.is_empty()
    }

    /// Number of overlay nodes in the page
    pub fn overlay_nodes(&self) -> usize {
        self.overlay_nodes.len()
    }

    /// How many times an overlay has been constructed
    pub fn overlays_built(&self) -> u32 {
        self.overlays_built
    }

    pub fn focus(&mut self, field: Editable) {
        self.focused = Some(field);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<&Editable> {
        self.focused.as_ref()
    }

    /// Insert text into the focused field. Returns false when nothing is focused.
    pub fn inject_text(&mut self, text: &str) -> bool {
        match self.focused.as_mut() {
            Some(field) => {
                field.insert(text);
                true
            }
            None => false,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }
}
