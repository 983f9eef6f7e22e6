//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the application,
//! kept in one place so the parser, store and CLI agree on them.

/// External display tool constants
pub mod tool {
    /// Default displayplacer location (Homebrew on Apple Silicon)
    pub const DEFAULT_PATH: &str = "/opt/homebrew/bin/displayplacer";

    /// Argument that prints the display report
    pub const LIST_ARG: &str = "list";

    /// Argument that prints the tool version
    pub const VERSION_ARG: &str = "--version";

    /// Default per-invocation timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Interval between `try_wait` polls while a command runs
    pub const POLL_INTERVAL_MS: u64 = 25;

    /// Brew formula suggested when the tool is missing
    pub const INSTALL_HINT: &str = "brew install jakehilborn/jakehilborn/displayplacer";
}

/// Display report field prefixes and defaults
pub mod report {
    /// Sentinel line that opens a new display section
    pub const SECTION_SENTINEL: &str = "Persistent screen id:";

    /// Trailing annotation on the origin line of the main display
    pub const MAIN_DISPLAY_MARKER: &str = "main display";

    /// Value reported by the tool when the refresh rate is unknown
    pub const UNKNOWN_HERTZ: &str = "N/A";

    pub const DEFAULT_WIDTH: u32 = 1920;
    pub const DEFAULT_HEIGHT: u32 = 1080;
    pub const DEFAULT_REFRESH_HZ: u32 = 60;
    pub const DEFAULT_COLOR_DEPTH: u8 = 8;
}

/// File locations (all relative to the user's home directory)
pub mod paths {
    pub const SETTINGS_FILENAME: &str = ".monitor_layout_settings.json";
    pub const LAYOUTS_FILENAME: &str = ".monitor_layouts.json";
    pub const BACKUP_DIRNAME: &str = ".monitor_layout_backups";

    /// Timestamp format used in backup and export file names
    pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
}

/// Validation limits for settings
pub mod validation {
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 120;
}
