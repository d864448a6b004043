use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;
use smart_default::SmartDefault;

make_log_macro!(debug, "config");

/// Options controlling how ambient readings are normalized.
#[derive(Deserialize, Clone, Debug, SmartDefault)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Each applesmc light channel is divided by this before averaging.
    #[default(2000.0)]
    #[serde(deserialize_with = "deserialize_positive")]
    pub smc_light_scale: f64,

    /// Illuminance in lux treated as full ambient light.
    #[default(400.0)]
    #[serde(deserialize_with = "deserialize_positive")]
    pub lux_reference: f64,
}

#[derive(Deserialize, Clone, Debug, SmartDefault)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct AutobrightConfig {
    /// Given in seconds in the config
    #[default(Duration::from_secs(5))]
    #[serde(deserialize_with = "deserialize_poll_interval")]
    pub poll_interval: Duration,

    #[default(true)]
    pub adjust_display: bool,

    #[default(true)]
    pub adjust_keyboard: bool,

    /// Range values are given as 0-100 in the config, but mapped to 0-1
    #[default([0.15, 0.95])]
    #[serde(deserialize_with = "deserialize_range")]
    pub display_range: [f64; 2],

    #[default([0.0, 1.0])]
    #[serde(deserialize_with = "deserialize_range")]
    pub keyboard_range: [f64; 2],

    /// Only backlight devices whose name matches are adjusted.
    #[default(".")]
    pub display_regex: String,

    #[default(PathBuf::from(SYSFS_ROOT))]
    pub sysfs_root: PathBuf,

    /// Route brightness writes through systemd-logind before falling back to sysfs.
    #[default(true)]
    pub use_logind: bool,

    pub sensor: SensorConfig,
}

fn deserialize_positive<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = Deserialize::deserialize(deserializer)?;
    debug!("{:?}", value);

    if !value.is_finite() || value <= 0.0 {
        return Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Float(value),
            &"a finite number greater than 0",
        ));
    }

    Ok(value)
}

fn deserialize_poll_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs: f64 = Deserialize::deserialize(deserializer)?;
    debug!("{:?}", secs);

    poll_interval_from_secs(secs).map_err(|_| {
        serde::de::Error::invalid_value(
            serde::de::Unexpected::Float(secs),
            &"a number of seconds greater than 0",
        )
    })
}

/// Convert a poll interval given in seconds, rejecting zero, negative and out of range values.
pub fn poll_interval_from_secs(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(AutobrightError::Config(format!(
            "Invalid poll interval {secs}, must be a number of seconds greater than 0"
        ))),
    }
}

// min > max is accepted, it produces an inverted mapping
fn deserialize_range<'de, D>(deserializer: D) -> Result<[f64; 2], D::Error>
where
    D: Deserializer<'de>,
{
    let range: [f64; 2] = Deserialize::deserialize(deserializer)?;
    debug!("{:?}", range);

    for val in range {
        if !RANGE_PERCENT.contains(&val) {
            return Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Float(val),
                &"number in the range of 0.0 to 100.0",
            ));
        }
    }
    Ok(range.map(|val| val / 100.0))
}

/// Per cycle settings handed to [`crate::Autobright::run_cycle`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleConfig {
    pub adjust_display: bool,
    pub adjust_keyboard: bool,
    pub display_range: (f64, f64),
    pub keyboard_range: (f64, f64),
}

impl Default for CycleConfig {
    fn default() -> Self {
        AutobrightConfig::default().cycle_config()
    }
}

impl AutobrightConfig {
    /// Load `autobright/config.toml` from the user's config directory,
    /// falling back to the defaults when it does not exist.
    pub async fn new() -> Result<Self> {
        match default_config_path() {
            Some(config_path) if config_path.exists() => Self::from_file(config_path).await,
            _ => {
                debug!("no config file, using defaults");
                Ok(AutobrightConfig::default())
            }
        }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        debug!("loading {}", path.as_ref().display());
        deserialize_toml_file(path).await
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            adjust_display: self.adjust_display,
            adjust_keyboard: self.adjust_keyboard,
            display_range: (self.display_range[0], self.display_range[1]),
            keyboard_range: (self.keyboard_range[0], self.keyboard_range[1]),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autobright").join("config.toml"))
}
