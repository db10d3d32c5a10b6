use tracing_subscriber::EnvFilter;

/// Options controlling subscriber installation.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub service_name: String,
    pub environment: String,
    /// CLI verbosity: 0 keeps the configured default, 1 is debug, 2+ is trace.
    pub verbosity: u8,
}

impl LoggingOptions {
    fn default_directive(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn json_output(&self) -> bool {
        // Human-readable output is for local work only; anything else is
        // assumed to be scraped by a log pipeline.
        self.environment != "development"
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// verbosity-derived default. Safe to call more than once; subsequent calls
/// are no-ops (relevant for tests).
pub fn init_logging(opts: &LoggingOptions) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(opts.default_directive()));

    let installed = if opts.json_output() {
        tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(
            service = %opts.service_name,
            version = env!("CARGO_PKG_VERSION"),
            environment = %opts.environment,
            "logging initialized"
        );
    }
}
