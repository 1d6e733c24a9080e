//! Port-call servicing tracker for a ship fleet
//!
//! Records deliveries of fresh water and removal of waste streams performed
//! by contractors at ports, with per-substance volume/cost line items, and
//! aggregates them into a per-ship / per-substance analytics view.

pub mod api;
pub mod charts;
pub mod db;
pub mod models;
pub mod seed;
