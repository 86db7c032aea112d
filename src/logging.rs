//! Log subscriber setup for the CLI.
//!
//! `RUST_LOG` wins when set. Otherwise the level comes from the number of
//! `-v` flags: notices and warnings by default, then debug, then trace.

use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity count.
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("prompt_gallery={level},warn")
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install the global subscriber, writing to stderr so prompts printed to
/// stdout stay clean. A second call is a no-op.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_target(verbosity > 0)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
