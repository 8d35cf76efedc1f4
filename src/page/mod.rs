//! Page agent: the code that runs inside every visited page

mod agent;
mod dom;

pub use agent::{AgentState, PageAgent, PageEvent, PageHandle, PageSnapshot};
pub use dom::{Editable, OverlayView, PageDom};
