use std::ops::RangeInclusive;
use std::time::Duration;

/// Default sysfs mount point
pub const SYSFS_ROOT: &str = "/sys";

/// Location of backlight devices, relative to the sysfs root
pub const BACKLIGHT_CLASS: &str = "class/backlight";

/// Location of LED devices, relative to the sysfs root
pub const LEDS_CLASS: &str = "class/leds";

/// Location of Industrial I/O devices, relative to the sysfs root
pub const IIO_DEVICES: &str = "bus/iio/devices";

/// Two channel ambient light reading exposed by the applesmc driver, formatted `(left,right)`
pub const SMC_LIGHT: &str = "devices/platform/applesmc.768/light";

/// Keyboard backlight LED registered by the applesmc driver
pub const SMC_KBD_LED: &str = "smc::kbd_backlight";

/// Suffix shared by every keyboard backlight LED name
pub const KBD_LED_SUFFIX: &str = "::kbd_backlight";

/// Filename for device's max brightness
pub const FILE_MAX_BRIGHTNESS: &str = "max_brightness";

/// Filename for current brightness.
pub const FILE_BRIGHTNESS: &str = "actual_brightness";

/// amdgpu drivers set the actual_brightness in a different scale than
/// [0, max_brightness], so we have to use the 'brightness' file instead.
pub const FILE_BRIGHTNESS_AMD: &str = "brightness";

/// set the requested brightness level
pub const FILE_BRIGHTNESS_WRITE: &str = "brightness";

/// Processed illuminance in lux
pub const FILE_ILLUMINANCE_INPUT: &str = "in_illuminance_input";

/// Unprocessed illuminance, needs `_scale` and `_offset` applied
pub const FILE_ILLUMINANCE_RAW: &str = "in_illuminance_raw";
pub const FILE_ILLUMINANCE_SCALE: &str = "in_illuminance_scale";
pub const FILE_ILLUMINANCE_OFFSET: &str = "in_illuminance_offset";

/// Minimum change before a new brightness is written
pub const THRESHOLD: f64 = 0.03;

/// Used when the configured poll interval is zero
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Range of valid values for brightness ranges in the config
pub const RANGE_PERCENT: RangeInclusive<f64> = 0.0..=100.;
