//! Configuration loading and component wiring for coderag.

pub mod bootstrap;
pub mod config;
pub mod secret;

pub use config::Config;
