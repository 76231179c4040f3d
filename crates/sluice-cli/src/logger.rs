//! Logging setup for the sluice CLI.
//!
//! Built on `tracing-subscriber`. `--verbose` turns on debug output for the
//! sluice crates, `--quiet` limits output to errors, and otherwise `RUST_LOG`
//! decides, falling back to info level.
//!
//! ```rust,no_run
//! use sluice_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("Serving assets from {}", "public/");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "sluice=debug,sluice_cli=debug";
const QUIET_FILTER: &str = "sluice=error,sluice_cli=error";
const DEFAULT_FILTER: &str = "sluice=info,sluice_cli=info";

/// Pick the filter for the given flags. `verbose` wins over `quiet`.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, before anything logs. Colors are disabled when `no_color` is
/// set or when [`should_use_colors`] says the terminal can't show them.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color || !should_use_colors());
}

/// Initialize the subscriber with an explicit filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Whether colored output should be used, honoring `NO_COLOR` and
/// `FORCE_COLOR` before asking the terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
