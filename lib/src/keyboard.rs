use crate::actuator::BrightnessControl;
use crate::consts::*;
use crate::device::*;
use crate::errors::*;
use crate::sensor::SensorBackend;

use std::path::Path;

use tokio::fs::read_dir;

make_log_macro!(debug, "keyboard");

/// The keyboard backlight control picked at startup.
///
/// Both kinds write through logind when it is reachable and fall back to sysfs.
pub enum KeyboardBackend {
    /// `smc::kbd_backlight`, next to the applesmc light sensor.
    Smc(Device),
    /// Any keyboard LED, used when the applesmc one is missing or unreadable.
    Service(Device),
    Unavailable,
}

impl KeyboardBackend {
    /// The applesmc LED is preferred when the light sensor came from applesmc as
    /// well and the LED can be read, otherwise any readable `*::kbd_backlight` LED is used.
    pub(crate) async fn probe(
        sysfs_root: &Path,
        sensor: &SensorBackend,
        dbus_proxy: Option<SessionProxy<'static>>,
    ) -> Self {
        if sensor.is_smc() {
            match open_readable(sysfs_root, SMC_KBD_LED, dbus_proxy.clone()).await {
                Ok(device) => {
                    debug!("using {SMC_KBD_LED}");
                    return KeyboardBackend::Smc(device);
                }
                Err(e) => debug!("{SMC_KBD_LED}: {e}"),
            }
        }

        match find_keyboard_leds(sysfs_root).await {
            Ok(names) => {
                for name in names {
                    match open_readable(sysfs_root, &name, dbus_proxy.clone()).await {
                        Ok(device) => {
                            debug!("using {name}");
                            return KeyboardBackend::Service(device);
                        }
                        Err(e) => debug!("{name}: {e}"),
                    }
                }
            }
            Err(e) => debug!("{e}"),
        }

        KeyboardBackend::Unavailable
    }

    pub fn name(&self) -> &str {
        match self {
            KeyboardBackend::Smc(device) | KeyboardBackend::Service(device) => {
                &device.device_name
            }
            KeyboardBackend::Unavailable => "none",
        }
    }

    fn device(&mut self) -> Option<&mut Device> {
        match self {
            KeyboardBackend::Smc(device) | KeyboardBackend::Service(device) => Some(device),
            KeyboardBackend::Unavailable => None,
        }
    }
}

async fn open_readable(
    sysfs_root: &Path,
    name: &str,
    dbus_proxy: Option<SessionProxy<'static>>,
) -> Result<Device> {
    let mut device = Device::new(sysfs_root, Subsystem::Leds, name, dbus_proxy).await?;
    device.get_brightness().await?;
    Ok(device)
}

async fn find_keyboard_leds(sysfs_root: &Path) -> Result<Vec<String>> {
    let mut entries = read_dir(sysfs_root.join(LEDS_CLASS)).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(KBD_LED_SUFFIX) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl BrightnessControl for KeyboardBackend {
    fn is_available(&self) -> bool {
        !matches!(self, KeyboardBackend::Unavailable)
    }

    async fn get(&mut self) -> Option<f64> {
        let device = self.device()?;
        match device.get_brightness().await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }

    async fn set(&mut self, value: f64) -> bool {
        let Some(device) = self.device() else {
            return false;
        };
        match device.set_brightness(value.clamp(0.0, 1.0)).await {
            Ok(()) => true,
            Err(e) => {
                debug!("{e}");
                false
            }
        }
    }
}
