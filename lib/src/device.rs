use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use zbus::Connection;

make_log_macro!(debug, "device");

#[zbus::dbus_proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
pub(crate) trait Session {
    fn set_brightness(&self, subsystem: &str, name: &str, brightness: u32) -> zbus::Result<()>;
}

/// Open a proxy to the caller's logind session.
///
/// This is the handle used for every write routed through logind, it is
/// created once per actuator and cloned into each device.
pub(crate) async fn logind_session() -> Result<SessionProxy<'static>> {
    let dbus_conn = Connection::system()
        .await
        .error("Failed to open DBus system connection")?;
    SessionProxy::new(&dbus_conn)
        .await
        .error("Failed to create SessionProxy")
}

/// Kernel device class a [`Device`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    Backlight,
    Leds,
}

impl Subsystem {
    fn as_str(self) -> &'static str {
        match self {
            Subsystem::Backlight => "backlight",
            Subsystem::Leds => "leds",
        }
    }

    fn class_dir(self) -> &'static str {
        match self {
            Subsystem::Backlight => BACKLIGHT_CLASS,
            Subsystem::Leds => LEDS_CLASS,
        }
    }

    /// Lowest raw value written. Panels stay lit at 0.0, keyboards turn off.
    fn raw_floor(self) -> u32 {
        match self {
            Subsystem::Backlight => 1,
            Subsystem::Leds => 0,
        }
    }
}

/// Something whose brightness can be read and written as 0.0..=1.0.
pub(crate) trait BrightnessDevice {
    async fn get_brightness(&mut self) -> Result<f64>;
    async fn set_brightness(&mut self, value: f64) -> Result<()>;
}

/// A sysfs brightness node, either a display backlight or an LED.
#[derive(Clone)]
pub struct Device {
    pub device_name: String,
    pub subsystem: Subsystem,
    read_brightness_file: PathBuf,
    write_brightness_file: PathBuf,
    max_brightness: u32,
    dbus_proxy: Option<SessionProxy<'static>>,
}

impl Device {
    pub(crate) async fn new(
        sysfs_root: &Path,
        subsystem: Subsystem,
        device_name: &str,
        dbus_proxy: Option<SessionProxy<'static>>,
    ) -> Result<Self> {
        let device_path = sysfs_root.join(subsystem.class_dir()).join(device_name);

        let read_brightness_file = device_path.join(match subsystem {
            // LEDs have no actual_brightness
            Subsystem::Leds => FILE_BRIGHTNESS_WRITE,
            Subsystem::Backlight if device_path.ends_with("amdgpu_bl0") => FILE_BRIGHTNESS_AMD,
            Subsystem::Backlight => FILE_BRIGHTNESS,
        });

        let max_brightness: u32 = read_value(device_path.join(FILE_MAX_BRIGHTNESS))
            .await
            .error("Failed to read max brightness")?;
        if max_brightness == 0 {
            return Err(AutobrightError::InvalidReading(format!(
                "{device_name}: max_brightness is 0"
            )));
        }

        Ok(Self {
            device_name: device_name.to_string(),
            subsystem,
            read_brightness_file,
            write_brightness_file: device_path.join(FILE_BRIGHTNESS_WRITE),
            max_brightness,
            dbus_proxy,
        })
    }

    async fn write_sysfs(&self, raw_brightness: u32) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.write_brightness_file)
            .await
            .error("Could not open brightness file to write")?;
        file.write_all(raw_brightness.to_string().as_bytes())
            .await
            .error("Could not write sysfs brightness")?;
        // tokio only reports the write's outcome once it is flushed
        file.flush().await.error("Could not write sysfs brightness")
    }
}

impl BrightnessDevice for Device {
    /// Query the brightness value for this device, as a percent (0.0..=1.0).
    async fn get_brightness(&mut self) -> Result<f64> {
        let raw_brightness: u32 = read_value(&self.read_brightness_file)
            .await
            .error("Failed to read brightness file")?;
        Ok(raw_to_unit(raw_brightness, self.max_brightness))
    }

    /// Set the brightness value for this device, as a percent (0.0..=1.0).
    async fn set_brightness(&mut self, value: f64) -> Result<()> {
        let raw_brightness =
            unit_to_raw(value, self.max_brightness, self.subsystem.raw_floor());
        debug!("{} <- {raw_brightness}", self.device_name);

        let Some(dbus_proxy) = &self.dbus_proxy else {
            return self.write_sysfs(raw_brightness).await;
        };
        match dbus_proxy
            .set_brightness(self.subsystem.as_str(), &self.device_name, raw_brightness)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("{e}");
                // Fall back to writing to sysfs brightness file
                self.write_sysfs(raw_brightness).await
            }
        }
    }
}
