//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;
use crate::error::{MigrationError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. If a subscriber is
/// already installed this is a no-op.
///
/// # Errors
///
/// Returns an error if the level or format is invalid, or the log file
/// cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            MigrationError::Config(format!("invalid log level '{}': {e}", config.level))
        })?;

    let result = tracing_subscriber::registry()
        .with(fmt_layer(config)?)
        .with(filter)
        .try_init();
    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
    Ok(())
}

fn fmt_layer(config: &LoggingConfig) -> Result<BoxedLayer> {
    let json = match config.format.as_str() {
        "text" => false,
        "json" => true,
        other => {
            return Err(MigrationError::Config(format!(
                "unknown log format '{other}', expected 'text' or 'json'"
            )));
        }
    };

    let layer = fmt::layer().with_target(false);
    let Some(path) = &config.file else {
        return Ok(if json {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            MigrationError::Config(format!("cannot open log file {}: {e}", path.display()))
        })?;
    let layer = layer.with_ansi(false).with_writer(Mutex::new(file));
    Ok(if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    })
}
