use crate::actuator::BrightnessControl;
use crate::consts::*;
use crate::device::*;
use crate::errors::*;
use crate::util::*;

use std::path::PathBuf;

use regex::Regex;
use tokio::fs::read_dir;

make_log_macro!(debug, "display");

/// Every backlight device matching a regex, all driven to the same level.
///
/// Devices are enumerated on each call so panels that come and go (docks,
/// DDC/CI monitors) are picked up without restarting.
pub struct Display {
    sysfs_root: PathBuf,
    device_regex: Regex,
    dbus_proxy: Option<SessionProxy<'static>>,
}

impl Display {
    pub(crate) fn new(
        sysfs_root: PathBuf,
        device_regex: Regex,
        dbus_proxy: Option<SessionProxy<'static>>,
    ) -> Self {
        Self {
            sysfs_root,
            device_regex,
            dbus_proxy,
        }
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let mut sysfs_paths = read_dir(self.sysfs_root.join(BACKLIGHT_CLASS)).await?;

        let mut device_names = Vec::new();
        while let Some(sysfs_path) = sysfs_paths.next_entry().await? {
            let device_name = sysfs_path.file_name().to_string_lossy().to_string();
            if self.device_regex.is_match(&device_name) {
                debug!("{:?} matched {}", device_name, self.device_regex.as_str());
                device_names.push(device_name);
            }
        }
        device_names.sort();

        let mut devices = Vec::new();
        for device_name in device_names {
            match Device::new(
                &self.sysfs_root,
                Subsystem::Backlight,
                &device_name,
                self.dbus_proxy.clone(),
            )
            .await
            {
                Ok(device) => devices.push(device),
                Err(e) => debug!("{device_name}: {e}"),
            }
        }
        Ok(devices)
    }
}

/// Brightness of the first device that can be read.
pub(crate) async fn first_brightness<D: BrightnessDevice>(devices: &mut [D]) -> Result<f64> {
    let mut error = AutobrightError::NoDevices;
    for device in devices {
        match device.get_brightness().await {
            Ok(value) => return Ok(value),
            Err(e) => error = e,
        }
    }
    Err(error)
}

/// Write to every device, succeeding if any of them accepted the value.
pub(crate) async fn set_all<D: BrightnessDevice>(devices: &mut [D], value: f64) -> Result<()> {
    join_all_accept_single_ok(
        devices
            .iter_mut()
            .map(|device| device.set_brightness(value)),
    )
    .await?;
    Ok(())
}

impl BrightnessControl for Display {
    /// Always true, the devices are only looked up when used.
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&mut self) -> Option<f64> {
        let result = match self.devices().await {
            Ok(mut devices) => first_brightness(&mut devices).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| debug!("get: {e}")).ok()
    }

    async fn set(&mut self, value: f64) -> bool {
        let value = value.clamp(0.0, 1.0);
        let result = match self.devices().await {
            Ok(mut devices) => set_all(&mut devices, value).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| debug!("set: {e}")).is_ok()
    }
}
