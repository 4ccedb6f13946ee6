// Public API - session engine, wire codec and data types
pub mod config;
pub mod error;
pub mod export;
pub mod ping;
pub mod probe;
pub mod state;

// Configuration layers used by the binary
pub mod cli;
pub mod prefs;
