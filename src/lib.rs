// ABOUTME: Library root for stratus - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod doctor;
pub mod error;
pub mod exec;
pub mod ops;
pub mod output;
pub mod provider;
pub mod state;
pub mod types;
