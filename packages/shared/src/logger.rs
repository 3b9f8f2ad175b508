//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Without it, `app_name` and the workspace crates
/// log at `default_level` and everything else at `warn`.
///
/// Log lines go to stderr so that chat output on stdout stays readable.
///
/// # Arguments
///
/// * `app_name` - Binary name, usually `env!("CARGO_BIN_NAME")`
/// * `default_level` - Level used when `RUST_LOG` is not set (e.g. "info")
pub fn setup_logger(app_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let target = app_name.replace('-', "_");
        EnvFilter::new(format!(
            "warn,{target}={default_level},sajiki_client={default_level},sajiki_shared={default_level}"
        ))
    });

    // A second initialization (e.g. from tests) is not an error worth reporting.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
}
