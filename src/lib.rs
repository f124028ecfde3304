pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod exit;
pub mod geo;
pub mod logs;
pub mod map;
pub mod photo;
pub mod platform;
pub mod query;
pub mod state;
pub mod store;
pub mod transfer;
pub mod tui;
pub mod ui;
