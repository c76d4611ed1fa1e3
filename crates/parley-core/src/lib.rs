//! Core types, config, errors, and port traits for Parley.

pub mod config;
pub mod error;
pub mod ports;
pub mod types;
