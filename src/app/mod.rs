//! Usage: Process bootstrap (logging, background wiring).

pub mod app_state;
pub mod logging;
