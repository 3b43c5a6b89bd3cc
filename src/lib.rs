// Library target exists to expose internal modules for integration tests.
// The binary entry point is in main.rs.

pub mod cli;
pub mod config;
pub mod connection;
pub mod diag;
pub mod error;
pub mod ledger;
pub mod session;
pub mod token;
pub mod update;
