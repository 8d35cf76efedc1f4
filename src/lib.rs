pub mod config;
pub mod data;
pub mod fabric;
pub mod model;
pub mod orchestrator;
pub mod page;
pub mod rehearsal;
pub mod relay;
pub mod util;

pub use config::Config;
pub use data::{Database, SharedStore, StoreError};
pub use fabric::{FabricError, MockFabric, ResourceFabric};
pub use model::{AssignmentEntry, DemoScript, PageId, Persona, RunId, Step};
pub use orchestrator::{Orchestrator, PlayError, RunHandle, RunSummary};
pub use page::{PageAgent, PageEvent, PageHandle};
pub use rehearsal::{Rehearsal, RehearsalReport};
pub use relay::{RelayHost, RelayMessage};
