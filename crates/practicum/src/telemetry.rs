use crate::config::{AppEnvironment, TelemetryConfig};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    InvalidFilter { directive: String, source: ParseError },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter { directive, .. } => {
                write!(f, "log filter '{}' is not a valid directive", directive)
            }
            TelemetryError::Install(err) => write!(f, "could not install subscriber: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::InvalidFilter {
            directive: config.log_level.clone(),
            source,
        })
    })
}

/// Install the global fmt subscriber. Only development output is colored and omits targets.
pub fn init(config: &TelemetryConfig, environment: AppEnvironment) -> Result<(), TelemetryError> {
    let interactive = environment == AppEnvironment::Development;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(!interactive)
        .with_ansi(interactive)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_reports_the_offending_directive() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "practicum=notalevel".to_string(),
        };
        match env_filter(&config) {
            Err(TelemetryError::InvalidFilter { directive, .. }) => {
                assert_eq!(directive, "practicum=notalevel")
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }
}
