pub mod logger;
pub mod route_planning;

pub use logger::*;
pub use route_planning::*;
