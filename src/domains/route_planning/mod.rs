pub mod actors;
pub mod candidates;
pub mod events;
pub mod exposure;
pub mod graph;
pub mod network_store;
pub mod pipeline;
pub mod planner;
pub mod ports;
pub mod result_cache;
pub mod selector;
pub mod snapper;
pub mod types;

pub use actors::*;
pub use candidates::*;
pub use events::*;
pub use exposure::{CameraIndex, Exposure};
pub use graph::*;
pub use network_store::*;
pub use pipeline::*;
pub use planner::*;
pub use ports::*;
pub use result_cache::*;
pub use selector::*;
pub use snapper::*;
pub use types::*;
