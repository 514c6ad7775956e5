//! Tracing subscriber setup for the command-line tool.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary. Output always goes to stderr so stdout stays clean JSON.

use std::str::FromStr;

use thiserror::Error;
use tracing::metadata::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// Default level when neither `--log-level` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: Level = Level::WARN;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("logging already initialized: {0}")]
    Init(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. An invalid `RUST_LOG` is
/// reported on stderr and the default filter is used instead.
pub fn setup_logging(
    log_level: Option<Level>,
    log_format: Option<LogFormat>,
) -> Result<LogFormat, LoggingError> {
    let level = log_level.unwrap_or(DEFAULT_LOG_LEVEL);
    let default_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .parse(level.to_string().to_ascii_lowercase())?;

    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV).ok() {
        Some(directive) => match EnvFilter::builder().parse(&directive) {
            Ok(filter) => filter,
            Err(err) => {
                eprintln!("invalid RUST_LOG filter: {err}");
                eprintln!("falling back to default logging");
                default_filter
            }
        },
        None => default_filter,
    };

    let log_format = log_format.unwrap_or(LogFormat::Compact);
    let use_color = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let json_layer = (log_format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .without_time()
            .with_writer(std::io::stderr)
    });
    let compact_layer = (log_format == LogFormat::Compact).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_ansi(use_color)
            .with_writer(std::io::stderr)
    });
    let pretty_layer = (log_format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .pretty()
            .without_time()
            .with_ansi(use_color)
            .with_writer(std::io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(json_layer)
        .with(compact_layer)
        .with(pretty_layer)
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(log_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
