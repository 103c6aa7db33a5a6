//! PDI inspection client
//!
//! Backend client, debounced search and the inspection flows built on the
//! `pdi-common` state engine.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod prompt;
pub mod search;
pub mod workflow;
