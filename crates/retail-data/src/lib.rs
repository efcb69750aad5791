//! Data layer for retail analytics.
//!
//! Responsible for loading transaction files, cleaning the resulting table,
//! computing the loyalty, quarterly, demand and purchase-pattern aggregates,
//! and running the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod cleaner;
pub mod reader;

pub use retail_core as core;
