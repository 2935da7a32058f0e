//! Subscriber setup for applications built on the dispatcher.
//!
//! The engine itself only emits events through `tracing`; installing a
//! subscriber is left to the application. Logs always go to stderr so they
//! never interleave with command output on stdout.

#[cfg(feature = "tracing")]
pub use tracing::{self, debug, error, info, instrument, trace, warn};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log line layout.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Multi-line, colored.
    Pretty,

    /// One line per event.
    #[default]
    Compact,

    /// Newline-delimited JSON.
    Json,
}

#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fixed level. `None` reads `RUST_LOG`, falling back to `warn`.
    pub level: Option<tracing::Level>,

    pub format: TracingFormat,

    pub timestamps: bool,

    /// Include module paths.
    pub target: bool,

    /// ANSI colors (ignored for JSON).
    pub ansi: bool,
}

#[cfg(feature = "tracing")]
impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: false,
            target: false,
            ansi: false,
        }
    }
}

#[cfg(feature = "tracing")]
fn env_filter(level: Option<tracing::Level>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    }
}

#[cfg(feature = "tracing")]
fn fmt_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.target)
        .with_ansi(config.ansi);

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => base.pretty().boxed(),
        (TracingFormat::Pretty, false) => base.pretty().without_time().boxed(),
        (TracingFormat::Compact, true) => base.compact().boxed(),
        (TracingFormat::Compact, false) => base.compact().without_time().boxed(),
        (TracingFormat::Json, true) => base.json().boxed(),
        (TracingFormat::Json, false) => base.json().without_time().boxed(),
    }
}

/// Install a compact stderr subscriber filtered by `RUST_LOG`.
///
/// ```ignore
/// verbs::tracing_support::init_subscriber();
/// // RUST_LOG=verbs=debug myapp deploy --env prod
/// ```
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    init_subscriber_with_config(TracingConfig::default());
}

/// Install a subscriber built from `config`.
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_subscriber_with_config(config: TracingConfig) {
    let result = tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(env_filter(config.level))
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
