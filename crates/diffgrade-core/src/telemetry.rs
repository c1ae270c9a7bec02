//! Tracing initialisation for grader binaries and embedding harnesses.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `json` selects newline-delimited JSON lines. `level` applies when
/// `RUST_LOG` is not set. Logs go to stderr so they never mix with graded
/// program output.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let plain = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let structured = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });

    // A second call finds the global subscriber already set.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(structured)
        .try_init();
}
