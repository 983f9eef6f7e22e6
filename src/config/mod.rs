//! Configuration management for monitor-layout
//!
//! - **settings**: tool path, timeouts and file locations (JSON in the home directory)

pub mod settings;

pub use settings::Settings;
