use std::io;

use tracing::Level;
use tracing_subscriber::{
    fmt::format::format,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// Guard object. Hold onto it for the lifetime of the process to keep
/// buffered log lines from being dropped on shutdown.
pub struct TracingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes the orchestrator binary's tracing subscriber: stdout, `INFO`
/// by default, overridable with `RUST_LOG`, `LOG_FORMAT=json|compact|pretty`
/// selects the event formatter.
pub fn init_tracing() -> TracingGuard {
    let color_disabled = std::env::var("NO_COLOR").is_ok();
    let format_layer = tracing_subscriber::fmt::layer()
        .with_ansi(!color_disabled)
        .with_writer(io::stdout);
    let format_layer = match std::env::var("LOG_FORMAT") {
        Ok(s) if s == "json" => format_layer.event_format(format().json()).boxed(),
        Ok(s) if s == "pretty" => format_layer.event_format(format().pretty()).boxed(),
        _ => format_layer.event_format(format().compact()).boxed(),
    };
    let format_layer = format_layer
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str())),
        )
        .boxed();

    tracing_subscriber::registry().with(format_layer).init();
    TracingGuard { _guard: None }
}

/// Best-effort subscriber init for tests; never panics if one is already set.
#[cfg(any(test, feature = "testing"))]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .compact()
        .try_init();
}
