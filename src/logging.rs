//! Leveled logger (§6 global flag `--log-level {0..5}`, §9 "only
//! process-wide state is the logger configuration"): a thin mapping
//! from the specification's six-level scale onto `log`'s `LevelFilter`,
//! initialised once from the CLI.
use log::LevelFilter;

/// `0..=5` maps onto trace/debug/info/warn/error/(fatal). `log` has no
/// "fatal" level of its own — level 5 is rendered as `Off`, since a
/// fatal condition always aborts the process via its own error path
/// rather than being observed through the logger.
pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        2 => LevelFilter::Info,
        3 => LevelFilter::Warn,
        4 => LevelFilter::Error,
        _ => LevelFilter::Off,
    }
}

/// Initialises the global logger exactly once, at process start.
pub fn init(level: u8) {
    env_logger::Builder::new().filter_level(level_filter(level)).init();
}
