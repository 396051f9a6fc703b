use tracing::Level;
use tracing_subscriber::EnvFilter;

pub fn default_level(quiet: bool) -> Level {
    if quiet {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// `RUST_LOG` overrides the level picked from `--quiet`.
pub fn init_tracing(quiet: bool, no_color: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(quiet).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .init();
}
