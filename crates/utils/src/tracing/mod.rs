use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// `RUST_LOG` wins when set. Otherwise the level follows the verbosity flag:
/// `0` → info, `1` → debug, `2+` → trace. Output goes to stderr so stdout
/// stays clean for JSON summaries and graph output.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span for the entire pipeline execution
pub fn pipeline_span(label: &str, total_items: usize) -> Span {
    span!(Level::INFO, "pipeline", label = %label, total_items = %total_items)
}

/// Create a span for one dependency tier
pub fn tier_span(tier: usize, items: usize) -> Span {
    span!(Level::INFO, "tier", tier = %tier, items = %items)
}

/// Create a span for a single work item
pub fn item_span(name: &str) -> Span {
    span!(Level::INFO, "item", item = %name)
}

/// Emit a structured event for cache lookups
pub fn cache_event(item: &str, key: &str, hit: bool, source: &str) {
    if hit {
        debug!(item = %item, cache_key = %key, source = %source, "cache_hit");
    } else {
        debug!(item = %item, cache_key = %key, source = %source, "cache_miss");
    }
}
