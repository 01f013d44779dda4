//! Usage: Infrastructure (data dir, settings file, sqlite pool, title persistence).

pub mod app_paths;
pub mod db;
pub mod settings;
pub mod title_store;
