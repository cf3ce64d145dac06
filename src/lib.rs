pub mod analysis;
pub mod cli;
pub mod config;
pub mod core;
pub mod detect;
pub mod digest;
pub mod engine;
pub mod exit;
pub mod fetch;
pub mod notify;
pub mod report;
pub mod snapshots;
pub mod ui;
