pub mod ai; // Vision model providers
pub mod archive; // Spreadsheet + image storage
pub mod config;
pub mod pipeline; // Prompt compiler, response extractor, row projector
pub mod schema; // questions.json

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// machine-readable; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
