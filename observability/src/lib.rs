//! Tracing setup shared by all daoscan services.

use error_stack::{Result, ResultExt};
use tracing::Subscriber;
use tracing_subscriber::{prelude::*, registry::LookupSpan, EnvFilter, Layer};

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug)]
pub struct ObservabilityInitError;

impl error_stack::Context for ObservabilityInitError {}

impl std::fmt::Display for ObservabilityInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("failed to initialize observability")
    }
}

/// Initialize the tracing subscriber.
///
/// Should be called once during application startup. Log level is
/// controlled with `RUST_LOG` (default `info`); set
/// `RUST_LOG_FORMAT=json` to emit newline-delimited JSON.
pub fn init_observability() -> Result<(), ObservabilityInitError> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    tracing_subscriber::registry()
        .with(stdout())
        .try_init()
        .change_context(ObservabilityInitError)
        .attach_printable("failed to install tracing subscriber")?;

    Ok(())
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let log_env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_filter(log_env_filter)
            .boxed()
    }
}
