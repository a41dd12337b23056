//! System-wide constants for the SHIFTIO workspace.

/// Default I/O configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/shiftio/io.toml";

/// Name of the dedicated blocking-I/O executor thread.
pub const IO_THREAD_NAME: &str = "io_thread";

/// Cycles between two periodic statistics log lines of a refresh flow.
pub const STATS_LOG_INTERVAL: u64 = 1000;
