/// Initialize tracing for the node.
///
/// `default_level` is matched case-insensitively; anything unrecognised falls
/// back to `info`. Logs go to stderr so CLI output on stdout stays clean.
pub fn init(default_level: &str) {
    let lvl = parse_level(default_level);

    // try_init so tests and the CLI can call this more than once
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
