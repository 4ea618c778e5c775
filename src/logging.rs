//! Logging and tracing setup
//!
//! Structured logging through `tracing`. Chain-of-custody events go to the
//! `forensic_audit` target (see `common::audit`) and can be filtered on their
//! own:
//!
//! ```bash
//! RUST_LOG=debug nft analyze --case Case1 Acme-Case1-1.pcap
//! RUST_LOG=forensic_audit=info nft report Case1
//! RUST_LOG=nft_lib::analysis=trace nft analyze --case Case1 Acme-Case1-1.pcap
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("nft=debug,nft_lib=debug,forensic_audit=info")
    } else {
        EnvFilter::new("nft=info,nft_lib=info,forensic_audit=info")
    }
}

/// Initialize logging. Call once from `main`; `RUST_LOG` overrides the
/// default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Ignore the error if a subscriber is already installed (tests)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Verbose logging: everything at debug, with file:line and thread ids
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Skip expensive debug-only work when nobody is listening
#[inline]
pub fn is_debug_enabled() -> bool {
    tracing::enabled!(Level::DEBUG)
}
