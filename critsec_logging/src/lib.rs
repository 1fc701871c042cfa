//! Logging for the critsec crates.
//!
//! Lock events are emitted under the `critsec` target. Filtering follows
//! `RUST_LOG`; when it is unset only warnings and errors are shown.
pub use tracing::{self, debug, error, info, instrument, trace, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Target used by every event the lock crates emit
pub const TARGET: &str = "critsec";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Installs the subscriber and a panic hook that logs the panic before
/// terminating the process. Meant for binaries; a panic inside a critical
/// region never gets to unwind when this hook is active.
pub fn setup_log() {
    std::panic::set_hook(Box::new(|info| {
        error!(target: TARGET, "Panic occurred: {}", info);
        std::process::exit(1);
    }));

    setup_log_no_panic_hook()
}

/// Installs the subscriber only. Safe to call repeatedly; later calls are no-ops.
pub fn setup_log_no_panic_hook() {
    let _ = SubscriberBuilder::default()
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(env_filter())
        .with_test_writer()
        .finish()
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
