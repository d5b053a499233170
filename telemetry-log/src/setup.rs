use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

// Import CRATE_NAMES, which lists all crates in the workspace.
include!(concat!(env!("OUT_DIR"), "/constants.gen.rs"));

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  telemetry_buffer::buffer: flushing 12 items
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z  INFO telemetry_buffer::buffer: flushing 12 items
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2020-12-04T12:11:08.729716Z","level":"INFO","target":"telemetry_buffer::buffer","message":"flushing 12 items"}
    /// ```
    Json,
}

/// The level filter as written in configuration files, e.g. `"debug"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogLevel(pub LevelFilter);

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(filter: LevelFilter) -> Self {
        Self(filter)
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        Self(level.into())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.to_string().to_lowercase())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<LevelFilter>()
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for the crates of this workspace.
    ///
    /// Third-party crates log at `info`. Setting `RUST_LOG` overrides both.
    pub level: LogLevel,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based on the TTY.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel(LevelFilter::INFO),
            format: LogFormat::Auto,
        }
    }
}

/// Builds the filter used when `RUST_LOG` is not set.
fn default_filter(level: LevelFilter) -> EnvFilter {
    let mut directives = LevelFilter::INFO.to_string().to_lowercase();
    for name in CRATE_NAMES {
        directives.push_str(&format!(",{name}={}", level.to_string().to_lowercase()));
    }
    EnvFilter::new(directives)
}

/// Initialize the logging system.
///
/// Calling this more than once has no effect; the first subscriber stays installed.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level.0));

    let format = match (config.format, console::user_attended()) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => LogFormat::Pretty,
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => LogFormat::Simplified,
        (LogFormat::Json, _) => LogFormat::Json,
    };

    let format_layer = match format {
        LogFormat::Json => tfmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed(),
        LogFormat::Simplified => tfmt::layer().with_ansi(false).with_target(true).boxed(),
        _ => tfmt::layer().with_ansi(true).with_target(true).compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(format_layer)
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_from_json() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.level, LogLevel(LevelFilter::DEBUG));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_log_config_defaults() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.level, LogLevel(LevelFilter::INFO));
        assert_eq!(config.format, LogFormat::Auto);
    }

    #[test]
    fn test_level_roundtrip() {
        let level = LogLevel(LevelFilter::TRACE);
        assert_eq!(serde_json::to_string(&level).unwrap(), r#""trace""#);
        assert!(serde_json::from_str::<LogLevel>(r#""loud""#).is_err());
    }
}
