//! Testdeck - test management data layer and report aggregation.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod models;
pub mod report;
pub mod store;
