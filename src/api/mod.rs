//! API module for the port-call servicing tracker
//!
//! REST interface over the shared fleet service.

pub mod handlers;
pub mod service;

pub use service::FleetService;
