pub mod error;
pub mod event;
pub mod single_flight;

pub use error::*;
pub use event::*;
pub use single_flight::*;
