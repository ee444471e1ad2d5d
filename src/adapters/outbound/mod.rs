pub mod buffered_logger;
pub mod console_logger;
pub mod file_logger;
pub mod filesystem_graph_store;
pub mod geojson_sources;
pub mod multi_logger;
pub mod noop_logger;
pub mod result_store;

pub use buffered_logger::*;
pub use console_logger::*;
pub use file_logger::*;
pub use filesystem_graph_store::*;
pub use geojson_sources::*;
pub use multi_logger::*;
pub use noop_logger::*;
pub use result_store::*;
