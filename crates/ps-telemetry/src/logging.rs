//! Structured logging setup.
//!
//! Logs go to stderr so tool output on stdout stays machine-readable.
//! With `json_logs` enabled every line is a JSON object carrying:
//! - `timestamp`, `level`, `target`
//! - `fields.message` plus any structured fields (`collection`, `from_block`, ...)
//! - `span` context of the enclosing sync / build operation

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed or the filter directive is
/// malformed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {e}")))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .with_file(config.with_source)
            .with_line_number(config.with_source)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_file(config.with_source)
            .with_line_number(config.with_source)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging configured"
    );
    Ok(())
}

/// Log a collection-scoped event with the standard `collection` field.
#[macro_export]
macro_rules! log_collection_event {
    ($level:ident, $collection:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            collection = %$collection,
            $($($field)*,)?
            $msg
        )
    };
}
