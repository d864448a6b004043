//! Ambient light sensing.
//!
//! Two kinds of hardware are supported. Apple machines running the applesmc
//! driver expose a two channel light sensor next to the keyboard backlight
//! controller, everything else is expected to provide an Industrial I/O
//! illuminance channel (hid-sensor-als, acpi-als, ...).

use crate::config::SensorConfig;
use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs::{File, read_dir};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};

make_log_macro!(debug, "sensor");

static SMC_LIGHT_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\((\d+),(\d+)\)$").expect("valid regex"));

/// Source of ambient light readings.
#[allow(async_fn_in_trait)]
pub trait AmbientSensor {
    fn is_available(&self) -> bool;

    /// Take one sample, normalized to 0.0..=1.0.
    ///
    /// `None` means nothing could be read this time and must not be treated as darkness.
    async fn read_level(&mut self) -> Option<f64>;
}

/// An open sysfs attribute that is re-read from the start on every sample.
#[derive(Debug)]
struct Attribute {
    file: File,
}

impl Attribute {
    async fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path).await?;
        Ok(Self { file })
    }

    async fn read(&mut self) -> Result<String> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut content = String::new();
        self.file.read_to_string(&mut content).await?;
        Ok(content.trim().to_string())
    }
}

#[derive(Debug)]
pub struct SmcSensor {
    light: Attribute,
    scale: f64,
}

impl SmcSensor {
    pub async fn open(sysfs_root: &Path, config: &SensorConfig) -> Result<Self> {
        let mut sensor = Self {
            light: Attribute::open(sysfs_root.join(SMC_LIGHT)).await?,
            scale: config.smc_light_scale,
        };
        sensor.sample().await?;
        Ok(sensor)
    }

    async fn sample(&mut self) -> Result<f64> {
        let reading = self.light.read().await?;
        let (left, right) = parse_smc_light(&reading)?;
        let level = (left / self.scale + right / self.scale) / 2.0;
        Ok(level.clamp(0.0, 1.0))
    }
}

fn parse_smc_light(reading: &str) -> Result<(f64, f64)> {
    let captures = SMC_LIGHT_FORMAT
        .captures(reading)
        .ok_or_else(|| AutobrightError::InvalidReading(reading.to_string()))?;
    Ok((captures[1].parse()?, captures[2].parse()?))
}

#[derive(Debug)]
pub struct IioSensor {
    pub device_name: String,
    illuminance: Attribute,
    /// Applied to raw channels, `None` when the channel is already in lux
    calibration: Option<(f64, f64)>,
    lux_reference: f64,
}

impl IioSensor {
    /// Open the first IIO device with a readable illuminance channel.
    pub async fn open(sysfs_root: &Path, config: &SensorConfig) -> Result<Self> {
        let mut entries = read_dir(sysfs_root.join(IIO_DEVICES)).await?;
        let mut device_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            device_names.push(entry.file_name().to_string_lossy().to_string());
        }
        device_names.sort();

        for device_name in device_names {
            let device_path = sysfs_root.join(IIO_DEVICES).join(&device_name);
            match Self::open_device(device_name.clone(), &device_path, config).await {
                Ok(sensor) => return Ok(sensor),
                Err(e) => debug!("{device_name}: {e}"),
            }
        }
        Err(AutobrightError::NoDevices)
    }

    async fn open_device(
        device_name: String,
        device_path: &Path,
        config: &SensorConfig,
    ) -> Result<Self> {
        let (illuminance, calibration) =
            match Attribute::open(device_path.join(FILE_ILLUMINANCE_INPUT)).await {
                Ok(input) => (input, None),
                Err(_) => {
                    let raw = Attribute::open(device_path.join(FILE_ILLUMINANCE_RAW)).await?;
                    let scale = read_value(device_path.join(FILE_ILLUMINANCE_SCALE))
                        .await
                        .unwrap_or(1.0);
                    let offset = read_value(device_path.join(FILE_ILLUMINANCE_OFFSET))
                        .await
                        .unwrap_or(0.0);
                    (raw, Some((scale, offset)))
                }
            };

        let mut sensor = Self {
            device_name,
            illuminance,
            calibration,
            lux_reference: config.lux_reference,
        };
        sensor.sample().await?;
        Ok(sensor)
    }

    async fn sample(&mut self) -> Result<f64> {
        let mut value: f64 = self.illuminance.read().await?.parse()?;
        if let Some((scale, offset)) = self.calibration {
            value = (value + offset) * scale;
        }
        Ok(normalize_lux(value, self.lux_reference))
    }
}

/// Values above 1 are taken to be lux rather than an already normalized level.
fn normalize_lux(value: f64, lux_reference: f64) -> f64 {
    let value = value.max(0.0);
    if value > 1.0 {
        (value / lux_reference).min(1.0)
    } else {
        value
    }
}

/// The ambient light sensor picked at startup.
#[derive(Debug)]
pub enum SensorBackend {
    Smc(SmcSensor),
    Iio(IioSensor),
    Unavailable,
}

impl SensorBackend {
    /// Pick the first sensor that can be opened, applesmc before IIO.
    pub async fn probe(sysfs_root: &Path, config: &SensorConfig) -> Self {
        match SmcSensor::open(sysfs_root, config).await {
            Ok(sensor) => {
                debug!("using applesmc light sensor");
                return SensorBackend::Smc(sensor);
            }
            Err(e) => debug!("applesmc: {e}"),
        }
        match IioSensor::open(sysfs_root, config).await {
            Ok(sensor) => {
                debug!("using iio light sensor {}", sensor.device_name);
                SensorBackend::Iio(sensor)
            }
            Err(e) => {
                debug!("iio: {e}");
                SensorBackend::Unavailable
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SensorBackend::Smc(_) => "applesmc",
            SensorBackend::Iio(sensor) => &sensor.device_name,
            SensorBackend::Unavailable => "none",
        }
    }

    pub fn is_smc(&self) -> bool {
        matches!(self, SensorBackend::Smc(_))
    }
}

impl AmbientSensor for SensorBackend {
    fn is_available(&self) -> bool {
        !matches!(self, SensorBackend::Unavailable)
    }

    async fn read_level(&mut self) -> Option<f64> {
        let level = match self {
            SensorBackend::Smc(sensor) => sensor.sample().await,
            SensorBackend::Iio(sensor) => sensor.sample().await,
            SensorBackend::Unavailable => return None,
        };
        match level {
            Ok(level) => Some(level),
            Err(e) => {
                debug!("read failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_smc(root: &Path, reading: &str) {
        let path = root.join(SMC_LIGHT);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("{reading}\n")).unwrap();
    }

    fn fake_iio(root: &Path, device: &str, files: &[(&str, &str)]) {
        let dir = root.join(IIO_DEVICES).join(device);
        fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            fs::write(dir.join(name), format!("{contents}\n")).unwrap();
        }
    }

    #[test]
    fn smc_light_format() {
        assert_eq!(parse_smc_light("(800,1200)").unwrap(), (800.0, 1200.0));
        assert!(parse_smc_light("800 1200").is_err());
        assert!(parse_smc_light("(-1,3)").is_err());
    }

    #[test]
    fn lux_normalization() {
        assert_eq!(normalize_lux(-3.0, 400.0), 0.0);
        assert_eq!(normalize_lux(0.6, 400.0), 0.6);
        assert_eq!(normalize_lux(200.0, 400.0), 0.5);
        assert_eq!(normalize_lux(10_000.0, 400.0), 1.0);
    }

    #[tokio::test]
    async fn smc_averages_channels() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_smc(dir.path(), "(800,1200)");

        let mut backend = SensorBackend::probe(dir.path(), &SensorConfig::default()).await;
        assert!(backend.is_smc());
        assert_eq!(backend.read_level().await, Some(0.5));

        // same handle, fresh sample
        fake_smc(dir.path(), "(4000,4000)");
        assert_eq!(backend.read_level().await, Some(1.0));
    }

    #[tokio::test]
    async fn smc_wins_over_iio() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_smc(dir.path(), "(0,0)");
        fake_iio(dir.path(), "iio:device0", &[(FILE_ILLUMINANCE_INPUT, "200")]);

        let backend = SensorBackend::probe(dir.path(), &SensorConfig::default()).await;
        assert_eq!(backend.name(), "applesmc");
    }

    #[tokio::test]
    async fn iio_raw_channel_is_calibrated() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_iio(dir.path(), "iio:device0", &[("name", "accel_3d")]);
        fake_iio(
            dir.path(),
            "iio:device1",
            &[
                (FILE_ILLUMINANCE_RAW, "1000"),
                (FILE_ILLUMINANCE_SCALE, "0.1"),
                (FILE_ILLUMINANCE_OFFSET, "0"),
            ],
        );

        let mut backend = SensorBackend::probe(dir.path(), &SensorConfig::default()).await;
        assert_eq!(backend.name(), "iio:device1");
        assert!(backend.is_available());
        let level = backend.read_level().await.unwrap();
        assert!((level - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_reading_is_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_iio(dir.path(), "iio:device0", &[(FILE_ILLUMINANCE_INPUT, "0.3")]);

        let mut backend = SensorBackend::probe(dir.path(), &SensorConfig::default()).await;
        assert_eq!(backend.read_level().await, Some(0.3));

        fake_iio(dir.path(), "iio:device0", &[(FILE_ILLUMINANCE_INPUT, "garbage")]);
        assert_eq!(backend.read_level().await, None);
    }

    #[tokio::test]
    async fn nothing_to_probe() {
        let dir = tempfile::TempDir::new().unwrap();
        fake_smc(dir.path(), "not a reading");

        let mut backend = SensorBackend::probe(dir.path(), &SensorConfig::default()).await;
        assert!(!backend.is_available());
        assert_eq!(backend.name(), "none");
        assert_eq!(backend.read_level().await, None);
    }
}
