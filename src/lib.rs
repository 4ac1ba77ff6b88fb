pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod state;
pub mod tui;
pub mod version;
pub mod view;
