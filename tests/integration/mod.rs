//! Integration tests for the OTA updater.
//!
//! These run the library against a local HTTP server and drive the `ota`
//! binary end to end. Fast, deterministic scenarios live here; everything
//! narrower is covered by unit tests next to the code.

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod config;
mod update_cycle;
