//! One-time process-wide diagnostics setup (SPEC_FULL §4.10): a
//! `color_eyre` panic/error hook plus a `tracing_subscriber::fmt`
//! subscriber, guarded by `std::sync::Once` so repeated calls (e.g. from
//! multiple integration tests in the same binary) are harmless.

use std::sync::Once;

static INSTALL: Once = Once::new();

pub fn install() {
    INSTALL.call_once(|| {
        color_eyre::install().expect("color_eyre::install should only run once");
        tracing_subscriber::fmt::init();
    });
}
