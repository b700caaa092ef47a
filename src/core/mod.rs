//! Shared primitives for the roadmap store.
//!
//! - `store`: store root layout and discovery
//! - `db`: connection setup and schema bootstrap
//! - `broker`: the single entry point for reads and transactional writes, with audit
//! - `schemas`: table definitions and file names
//! - `config`: `roadmap.toml`
//! - `error`: `RoadmapError` and its status mapping

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod schemas;
pub mod store;
pub mod time;
