use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use telemetry_buffer::{BufferOptions, ProcessorConfig, TelemetryMetadata};
use telemetry_log::LogConfig;
use telemetry_metrics::MetricsOptions;

/// Defines the source of a config error
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating from a specific field.
    Field(&'static str),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(Box::new(inner)),
        }
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, p: P) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::Field(name);
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => fmt::Display::fmt(&self.kind, f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::Field(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config file")]
    BadJson,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
}

#[derive(Clone, Copy, Debug)]
enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Values of the SDK used to enrich telemetry.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkOptions {
    /// The environment, e.g. `production` or `staging`.
    pub environment: String,
    /// The release of the application.
    pub release: Option<String>,
    /// Whether user PII from the scope is attached to telemetry.
    pub send_default_pii: bool,
    /// A stable identifier of this installation.
    pub installation_id: Option<String>,
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            environment: "production".to_owned(),
            release: None,
            send_default_pii: false,
            installation_id: None,
        }
    }
}

/// Config struct.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logging of the telemetry core itself.
    pub logging: LogConfig,
    /// SDK values used for enrichment.
    pub sdk: SdkOptions,
    /// Thresholds of the structured log buffer.
    pub logs: BufferOptions,
    /// Thresholds of the trace metric buffer.
    pub trace_metrics: BufferOptions,
    /// Metrics aggregation.
    pub metrics: MetricsOptions,
}

impl Config {
    /// Loads the config from a YAML or JSON file, chosen by the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            let error = io::Error::new(io::ErrorKind::InvalidInput, "unsupported file extension");
            ConfigError::wrap(error, ConfigErrorKind::InvalidValue).file(path)
        })?;

        let f = fs::File::open(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;

        let config: Self = match format {
            ConfigFormat::Yaml => serde_yaml::from_reader(io::BufReader::new(f))
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(path))?,
            ConfigFormat::Json => serde_json::from_reader(io::BufReader::new(f))
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson).file(path))?,
        };

        config.validate().map_err(|e| e.file(path))?;
        Ok(config)
    }

    /// Parses the config from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(s).map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the config from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, options) in [("logs", &self.logs), ("trace_metrics", &self.trace_metrics)] {
            if options.max_item_count == 0 {
                return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field(field));
            }
        }

        if self.metrics.aggregator.flush_interval.is_zero() {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("metrics"));
        }

        Ok(())
    }

    /// Returns the SDK metadata used to enrich telemetry items.
    pub fn metadata(&self) -> TelemetryMetadata {
        TelemetryMetadata {
            environment: self.sdk.environment.clone(),
            release: self.sdk.release.clone(),
            installation_id: self.sdk.installation_id.clone(),
            ..TelemetryMetadata::default()
        }
    }

    /// Returns the configuration of a telemetry processor without hooks.
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            logs: self.logs.clone(),
            trace_metrics: self.trace_metrics.clone(),
            send_default_pii: self.sdk.send_default_pii,
            metadata: self.metadata(),
            before_send_log: None,
            before_send_metric: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use insta::assert_snapshot;
    use similar_asserts::assert_eq;

    use super::*;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();

        assert_eq!(config.sdk.environment, "production");
        assert!(!config.sdk.send_default_pii);
        assert_eq!(config.logs, BufferOptions::default());
        assert_eq!(config.trace_metrics, BufferOptions::default());
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.aggregator.total_max_weight, 1000);
        assert_eq!(config.logging.level.to_string(), "info");
    }

    #[test]
    fn test_from_yaml_file() {
        let file = write_file(
            ".yml",
            r#"
logging:
  level: debug
  format: json
sdk:
  environment: staging
  release: app@2.1.0
  send_default_pii: true
logs:
  flush_timeout: 0.5
  max_item_count: 10
metrics:
  enabled: true
  aggregator:
    total_max_weight: 500
    flush_tolerance: 1
"#,
        );

        let config = Config::from_path(file.path()).unwrap();

        assert_eq!(config.logging.level.to_string(), "debug");
        assert_eq!(config.sdk.release.as_deref(), Some("app@2.1.0"));
        assert_eq!(config.logs.flush_timeout, Duration::from_millis(500));
        assert_eq!(config.logs.max_item_count, 10);
        assert_eq!(config.trace_metrics.max_item_count, 100);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.aggregator.total_max_weight, 500);
        assert_eq!(
            config.metrics.aggregator.flush_tolerance,
            Duration::from_secs(1)
        );

        let processor = config.processor_config();
        assert!(processor.send_default_pii);
        assert_eq!(processor.metadata.environment, "staging");
        assert_eq!(processor.logs.max_item_count, 10);
    }

    #[test]
    fn test_from_json_file() {
        let file = write_file(".json", r#"{"trace_metrics": {"max_buffer_size_bytes": 2048}}"#);
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.trace_metrics.max_buffer_size_bytes, 2048);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = Config::from_path(dir.path().join("config.yml")).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::CouldNotOpenFile);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_file(".toml", "logs = {}");
        let error = Config::from_path(file.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::InvalidValue);
    }

    #[test]
    fn test_bad_yaml_names_file() {
        let file = write_file(".yaml", "logs: [");
        let error = Config::from_path(file.path()).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::BadYaml);
        assert!(error.to_string().starts_with("could not parse yaml config file (file "));
    }

    #[test]
    fn test_bad_json() {
        let error = Config::from_json_str(r#"{"logs": {"flush_timeout": -1}}"#).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::BadJson);
    }

    #[test]
    fn test_invalid_value_names_field() {
        let error = Config::from_json_str(r#"{"trace_metrics": {"max_item_count": 0}}"#).unwrap_err();
        assert_eq!(error.kind(), ConfigErrorKind::InvalidValue);
        assert_snapshot!(error.to_string(), @"invalid config value (field trace_metrics)");
    }
}
