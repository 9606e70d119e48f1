//! Local work-activity tracker: session Start/Stop, periodic screenshots,
//! idle detection and an append-only CSV log.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod tracker;
pub mod ui;

#[cfg(test)]
mod tests;

pub use error::{Result, TrackerError};
