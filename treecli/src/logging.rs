use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log level directive for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Compact stderr formatter filtered at the level chosen by `verbosity`.
///
/// The filter is attached to this layer only, so other layers on the same
/// subscriber (the profiler) still see every span.
pub fn fmt_layer<S>(verbosity: u8) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_filter(EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber. Returns `false` if one was already set,
/// which happens when a host application configured logging itself.
pub fn setup_logging(verbosity: u8) -> bool {
    let installed = tracing_subscriber::registry()
        .with(fmt_layer(verbosity))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(level = level_for(verbosity), "logging initialized");
    }
    installed
}
