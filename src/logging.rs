use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{Layer, Registry, filter::LevelFilter, layer::SubscriberExt};

/// The most verbose level that is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Level {
    /// Everything, including every finished request.
    Trace,
    /// Failed requests and connection attempts.
    Debug,
    /// Pipeline start and end.
    Info,
    /// Degraded setup, such as a missing system DNS configuration.
    #[default]
    Warn,
    /// Errors only.
    Error,
    /// Nothing.
    Off,
}

impl Level {
    const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
            Self::Off => LevelFilter::OFF,
        }
    }
}

/// Installs the global subscriber. Logs go to stderr, as text or as JSON lines.
///
/// # Errors
///
/// Throws a `SetGlobalDefaultError` if a global subscriber is already installed.
pub fn set_up_logging(level: Level, json: bool) -> Result<(), SetGlobalDefaultError> {
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));

    let subscriber = Registry::default()
        .with(text_layer.with_filter(level.as_level_filter()))
        .with(json_layer.with_filter(level.as_level_filter()));
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::debug!(?level, json, "logging configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;
    use tracing_subscriber::filter::LevelFilter;

    use crate::logging::{Level, set_up_logging};

    #[test]
    fn levels_parse_from_the_command_line() {
        assert_eq!(Level::from_str("debug", true), Ok(Level::Debug));
        assert_eq!(Level::from_str("OFF", true), Ok(Level::Off));
        assert!(Level::from_str("verbose", true).is_err());
        assert_eq!(Level::default(), Level::Warn);
    }

    #[test]
    fn off_disables_everything() {
        assert_eq!(Level::Off.as_level_filter(), LevelFilter::OFF);
        assert_eq!(Level::Trace.as_level_filter(), LevelFilter::TRACE);
    }

    #[test]
    fn subscriber_is_installed_once() {
        assert!(set_up_logging(Level::Off, false).is_ok());
        assert!(set_up_logging(Level::Off, true).is_err());
    }
}
