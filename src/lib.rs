// ABOUTME: Library root for kestrel - exposes the deployer pipeline and plan tooling.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod controller;
pub mod deploy;
pub mod error;
pub mod output;
pub mod plan;
pub mod types;
