//! Logging configuration

use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::errors::EngineError;

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Level used when `RUST_LOG` is unset
    pub log_level: LogLevel,

    /// One JSON object per line instead of the human format
    pub json_format: bool,
}

impl LogOptions {
    pub fn new(log_level: LogLevel, json_format: bool) -> Self {
        Self {
            log_level,
            json_format,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.to_filter_string()))
    }
}

/// Initialize logging on stderr.
///
/// stdout is reserved for the binary's JSON results. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_logging(options: LogOptions) -> Result<(), EngineError> {
    let subscriber = tracing_subscriber::registry().with(options.filter());
    let layer = fmt::layer().with_writer(std::io::stderr);

    let result = if options.json_format {
        subscriber.with(layer.json()).try_init()
    } else {
        subscriber.with(layer).try_init()
    };

    result.map_err(|e| EngineError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.to_level(), Level::DEBUG);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_options() {
        let options = LogOptions::default();
        assert_eq!(options.log_level, LogLevel::Info);
        assert!(!options.json_format);

        let options = LogOptions::new(LogLevel::Debug, true);
        assert_eq!(options.log_level.to_filter_string(), "debug");
        assert!(options.json_format);
    }

    #[test]
    fn test_log_level_serde() {
        let level: LogLevel = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(level, LogLevel::Trace);
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"error\"");
    }
}
