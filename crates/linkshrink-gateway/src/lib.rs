//! HTTP gateway for the linkshrink URL shortener.
//!
//! Exposes the shortener over axum and wires the storage backend chosen on
//! the command line.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use config::Cli;
pub use state::AppState;
