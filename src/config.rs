use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::debug;

/// Prefix of the environment variables that configure the program, e.g. `PREQ_TIMEOUT`.
pub const ENV_PREFIX: &str = "PREQ";

const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_PARALLEL: i64 = 1;

/// The validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Time allowed for each request, from resolving the host to the end of the response.
    pub timeout: Duration,
    /// Number of requests in flight at once.
    pub parallel: usize,
    /// Additional CA certificates to trust, in PEM format.
    pub ca_file: Option<PathBuf>,
}

/// Values given on the command line. They take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// A configuration file to read.
    pub config_file: Option<PathBuf>,
    /// The timeout, in duration notation.
    pub timeout: Option<String>,
    /// The number of parallel requests.
    pub parallel: Option<usize>,
    /// A CA bundle.
    pub ca_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RawSettings {
    timeout: String,
    parallel: usize,
    ca_file: Option<PathBuf>,
}

impl Settings {
    /// Merges the built-in defaults, the configuration file, the environment and `overrides`, in
    /// increasing order of precedence.
    ///
    /// # Errors
    ///
    /// Throws a `ConfigError` if a source cannot be read, or if the timeout is not a positive
    /// duration or `parallel` is 0.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("timeout", DEFAULT_TIMEOUT)?
            .set_default("parallel", DEFAULT_PARALLEL)?;
        if let Some(path) = &overrides.config_file {
            builder = builder.add_source(File::from(path.as_path()));
        }
        let raw: RawSettings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("timeout", overrides.timeout.clone())?
            .set_override_option("parallel", overrides.parallel.map(|n| u64::try_from(n).unwrap_or(u64::MAX)))?
            .set_override_option("ca_file", overrides.ca_file.as_deref().map(path_to_string))?
            .build()?
            .try_deserialize()?;

        let settings = Self::validate(raw)?;
        debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    fn validate(raw: RawSettings) -> Result<Self, ConfigError> {
        let timeout = parse_duration(&raw.timeout)?;
        if timeout.is_zero() {
            return Err(ConfigError::Message(format!("timeout must be positive, got {:?}", raw.timeout)));
        }
        if raw.parallel == 0 {
            return Err(ConfigError::Message("parallel must be at least 1".to_string()));
        }
        Ok(Self { timeout, parallel: raw.parallel, ca_file: raw.ca_file })
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Parses a duration such as `300ms`, `1.5s` or `1m30s`.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. Every number needs a unit, except
/// a plain `0`.
///
/// # Errors
///
/// Throws `ConfigError::Message` if the input is not a duration.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::Message(format!("invalid duration {input:?}"));

    let mut rest = input.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale = unit_nanos(unit).ok_or_else(invalid)?;
        let nanos = scaled_nanos(number, scale).ok_or_else(invalid)?;
        total = total.checked_add(nanos).ok_or_else(invalid)?;
        rest = tail;
    }

    u64::try_from(total).map(Duration::from_nanos).map_err(|_| invalid())
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// `number` is `digits[.digits]`, with at least one digit on either side of the dot.
fn scaled_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole = if whole.is_empty() { 0 } else { whole.parse::<u128>().ok()? };
    let mut nanos = whole.checked_mul(scale)?;

    // digits beyond nanosecond precision cannot change the result
    let fraction = &fraction[..fraction.len().min(18)];
    if !fraction.is_empty() {
        let digits = u32::try_from(fraction.len()).ok()?;
        let value = fraction.parse::<u128>().ok()?;
        nanos = nanos.checked_add(value.checked_mul(scale)? / 10u128.pow(digits))?;
    }
    Some(nanos)
}
