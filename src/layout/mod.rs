//! Named layout presets
//!
//! - **profile**: [`LayoutProfile`] and the partial per-display settings it stores
//! - **command**: displayplacer command strings built from partial settings
//! - **reconcile**: matching a profile against live displays and running it
//! - **arrangement**: geometry helpers over a set of displays
//! - **store**: the JSON-backed collection of profiles

pub mod arrangement;
pub mod command;
pub mod profile;
pub mod reconcile;
pub mod store;

pub use profile::{DisplaySettings, LayoutProfile};
pub use store::{ImportMode, LayoutStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout '{name}' not found{}", suggestion_hint(.suggestions))]
    NotFound { name: String, suggestions: Vec<String> },
    #[error("no displays detected")]
    NoDisplays,
    #[error("layout name must not be empty")]
    EmptyName,
    #[error("layout '{name}' marks {count} displays as main (at most one allowed)")]
    MultipleMain { name: String, count: usize },
}

fn suggestion_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {})", suggestions.join(", "))
    }
}
