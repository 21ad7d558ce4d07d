//! Crate-level tests: end-to-end solve scenarios and solver-wide properties.

mod scenarios;

/// Opt-in log capture for tests; run with `RUST_LOG=debug` to see the
/// engine's pivot and incumbent tracing.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
