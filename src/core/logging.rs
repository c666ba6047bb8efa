//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```no_run
/// canopy::core::logging::init();
/// log::info!("Baking impostor atlas");
/// ```
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();
}

/// Initialize logging, ignoring repeated calls (tests, benches).
pub fn try_init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn")
    ).is_test(true).try_init();
}
