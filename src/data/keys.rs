//! Top-level keys of the shared store. Authoring and playback keys never overlap.

/// Saved scripts authored by the user (name -> script)
pub const USER_TEMPLATES: &str = "userTemplates";
/// Script imported and waiting for the next run
pub const PENDING_TEMPLATE: &str = "pendingTemplate";
/// Script of the current run
pub const DEMO: &str = "demo";
/// Identifier of the current run
pub const DEMO_RUN_ID: &str = "demoRunId";
/// Page ids created by the current run
pub const DEMO_TAB_IDS: &str = "demoTabIds";
/// Window ids created by the current run
pub const DEMO_WINDOW_IDS: &str = "demoWindowIds";
/// Page id -> persona assignment
pub const PERSONA_TABS: &str = "personaTabs";

