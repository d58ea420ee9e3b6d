// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point, shared by `main.rs` and the integration tests.

pub mod commands;
pub mod comms;
pub mod config;
pub mod logging;
