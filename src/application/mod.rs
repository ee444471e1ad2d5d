pub mod route_planning_service;

pub use route_planning_service::*;
