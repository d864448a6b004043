#![warn(clippy::match_same_arms)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unnecessary_wraps)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod util;
mod actuator;
mod config;
mod consts;
mod device;
mod display;
mod errors;
mod keyboard;
mod sensor;

use std::time::{Duration, SystemTime};

use regex::Regex;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior, interval};

pub use crate::actuator::BrightnessControl;
pub use crate::config::{AutobrightConfig, CycleConfig, SensorConfig, poll_interval_from_secs};
use crate::consts::*;
use crate::device::logind_session;
pub use crate::display::Display;
pub use crate::errors::AutobrightError;
use crate::errors::*;
pub use crate::keyboard::KeyboardBackend;
pub use crate::sensor::{AmbientSensor, IioSensor, SensorBackend, SmcSensor};
pub use crate::util::map;

make_log_macro!(debug, "autobright");

/// Used to construct [`Autobright`]
#[derive(Default)]
pub struct AutobrightBuilder {
    config: Option<AutobrightConfig>,
}

impl AutobrightBuilder {
    /// Create a new [`AutobrightBuilder`].
    pub fn new() -> Self {
        AutobrightBuilder::default()
    }

    /// Defaults to [`AutobrightConfig::new()`].
    pub fn with_config(mut self, config: AutobrightConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Probe the hardware once and return the constructed [`Autobright`] instance.
    pub async fn build(self) -> Result<Autobright> {
        let config = match self.config {
            Some(config) => config,
            None => AutobrightConfig::new().await?,
        };

        let device_regex = Regex::new(&config.display_regex)?;

        let dbus_proxy = if config.use_logind {
            logind_session()
                .await
                .map_err(|e| debug!("logind unavailable, writing sysfs directly: {e}"))
                .ok()
        } else {
            None
        };

        let sensor = SensorBackend::probe(&config.sysfs_root, &config.sensor).await;
        let keyboard =
            KeyboardBackend::probe(&config.sysfs_root, &sensor, dbus_proxy.clone()).await;
        let display = Display::new(config.sysfs_root.clone(), device_regex, dbus_proxy);

        Ok(Autobright::new(sensor, display, keyboard))
    }
}

/// Which features the hardware supports, decided once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub sensor_available: bool,
    pub keyboard_control_available: bool,
}

/// Outcome of a single control cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleResult {
    /// `None` when the sensor could not be read, in which case nothing was adjusted.
    pub ambient: Option<f64>,
    pub scanned_at: SystemTime,
    /// Value written to the display this cycle, if any
    pub display_target: Option<f64>,
    /// Value written to the keyboard this cycle, if any
    pub keyboard_target: Option<f64>,
}

enum LoopState {
    Stopped,
    Running {
        period: Duration,
        ticker: Option<Interval>,
    },
}

/// Drives display and keyboard brightness from ambient light readings.
///
/// The owner is expected to call [`Autobright::next_tick`] and
/// [`Autobright::run_cycle`] from a single task, cycles never overlap.
pub struct Autobright<S = SensorBackend, D = Display, K = KeyboardBackend> {
    sensor: S,
    display: D,
    keyboard: K,
    capabilities: Capabilities,
    state: LoopState,
    results: watch::Sender<Option<CycleResult>>,
}

impl<S, D, K> Autobright<S, D, K>
where
    S: AmbientSensor,
    D: BrightnessControl,
    K: BrightnessControl,
{
    /// Capabilities are read from the backends here and never change afterwards.
    pub fn new(sensor: S, display: D, keyboard: K) -> Self {
        let capabilities = Capabilities {
            sensor_available: sensor.is_available(),
            keyboard_control_available: keyboard.is_available(),
        };
        debug!("{capabilities:?}");
        let (results, _) = watch::channel(None);
        Self {
            sensor,
            display,
            keyboard,
            capabilities,
            state: LoopState::Stopped,
            results,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    /// Start running cycles every `period`.
    ///
    /// Does nothing and returns `false` when there is no sensor to read.
    pub fn start_loop(&mut self, period: Duration) -> bool {
        if !self.capabilities.sensor_available {
            debug!("not starting, no sensor");
            return false;
        }
        let period = period.max(MIN_POLL_INTERVAL);
        debug!("starting, period {period:?}");
        self.state = LoopState::Running {
            period,
            ticker: None,
        };
        true
    }

    pub fn stop_loop(&mut self) {
        if self.is_running() {
            debug!("stopping");
        }
        self.state = LoopState::Stopped;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running { .. })
    }

    /// Wait until the next cycle is due.
    ///
    /// The first call after [`Autobright::start_loop`] returns immediately.
    /// Returns `false` right away when the loop is stopped.
    pub async fn next_tick(&mut self) -> bool {
        let LoopState::Running { period, ticker } = &mut self.state else {
            return false;
        };
        let ticker = ticker.get_or_insert_with(|| {
            let mut ticker = interval(*period);
            // Late cycles are pushed back rather than run in a burst
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        true
    }

    /// Read the sensor once and adjust whatever needs adjusting.
    pub async fn run_cycle(&mut self, config: &CycleConfig) -> CycleResult {
        let mut result = CycleResult {
            ambient: self.sensor.read_level().await,
            scanned_at: SystemTime::now(),
            display_target: None,
            keyboard_target: None,
        };

        if let Some(ambient) = result.ambient {
            debug!("ambient {ambient:.3}");
            if config.adjust_display {
                let (low, high) = config.display_range;
                result.display_target = adjust(&mut self.display, map(ambient, low, high)).await;
            }
            if config.adjust_keyboard && self.capabilities.keyboard_control_available {
                let (low, high) = config.keyboard_range;
                result.keyboard_target = adjust(&mut self.keyboard, map(ambient, low, high)).await;
            }
        } else {
            debug!("no reading");
        }

        self.results.send_replace(Some(result));
        result
    }

    /// The result of the most recent cycle.
    pub fn last_result(&self) -> Option<CycleResult> {
        *self.results.borrow()
    }

    /// Get notified after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleResult>> {
        self.results.subscribe()
    }
}

/// Write `target` unless the current value is already within [`THRESHOLD`] of it.
///
/// Returns the value written, whether or not the write succeeded.
async fn adjust<A: BrightnessControl>(actuator: &mut A, target: f64) -> Option<f64> {
    let current = actuator.get().await;
    if current.is_some_and(|current| (current - target).abs() <= THRESHOLD) {
        return None;
    }
    if !actuator.set(target).await {
        debug!("write of {target:.3} failed");
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSensor {
        level: Option<f64>,
        available: bool,
    }

    impl AmbientSensor for StubSensor {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn read_level(&mut self) -> Option<f64> {
            self.level
        }
    }

    #[derive(Default)]
    struct StubActuator {
        available: bool,
        current: Option<f64>,
        gets: usize,
        writes: Vec<f64>,
    }

    impl StubActuator {
        fn at(current: f64) -> Self {
            Self {
                available: true,
                current: Some(current),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.gets + self.writes.len()
        }
    }

    impl BrightnessControl for StubActuator {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn get(&mut self) -> Option<f64> {
            self.gets += 1;
            self.current
        }

        async fn set(&mut self, value: f64) -> bool {
            self.writes.push(value);
            true
        }
    }

    fn engine(
        level: Option<f64>,
        display: StubActuator,
        keyboard: StubActuator,
    ) -> Autobright<StubSensor, StubActuator, StubActuator> {
        Autobright::new(
            StubSensor {
                level,
                available: true,
            },
            display,
            keyboard,
        )
    }

    fn cycle(display_range: (f64, f64), keyboard_range: (f64, f64)) -> CycleConfig {
        CycleConfig {
            adjust_display: true,
            adjust_keyboard: true,
            display_range,
            keyboard_range,
        }
    }

    #[tokio::test]
    async fn small_changes_are_skipped() {
        // ambient maps straight through with a 0..1 range
        let mut autobright = engine(Some(0.52), StubActuator::at(0.50), StubActuator::default());
        autobright.run_cycle(&cycle((0.0, 1.0), (0.0, 1.0))).await;
        assert!(autobright.display.writes.is_empty());

        let mut autobright = engine(Some(0.54), StubActuator::at(0.50), StubActuator::default());
        let result = autobright.run_cycle(&cycle((0.0, 1.0), (0.0, 1.0))).await;
        assert_eq!(autobright.display.writes, vec![0.54]);
        assert_eq!(result.display_target, Some(0.54));
    }

    #[tokio::test]
    async fn display_follows_ambient() {
        let mut autobright = engine(Some(0.40), StubActuator::at(0.10), StubActuator::default());
        let result = autobright.run_cycle(&cycle((0.15, 0.95), (0.0, 1.0))).await;

        assert_eq!(result.ambient, Some(0.40));
        assert_eq!(autobright.display.writes.len(), 1);
        assert!((autobright.display.writes[0] - 0.47).abs() < 1e-9);
    }

    #[tokio::test]
    async fn keyboard_near_target_is_left_alone() {
        let mut autobright = engine(Some(0.0), StubActuator::at(0.5), StubActuator::at(0.02));
        let result = autobright.run_cycle(&cycle((0.5, 0.5), (0.0, 1.0))).await;

        assert_eq!(autobright.keyboard.gets, 1);
        assert!(autobright.keyboard.writes.is_empty());
        assert_eq!(result.keyboard_target, None);
    }

    #[tokio::test]
    async fn unreadable_actuator_is_written() {
        let unreadable = StubActuator {
            available: true,
            ..Default::default()
        };
        let mut autobright = engine(Some(1.0), unreadable, StubActuator::default());
        autobright.run_cycle(&cycle((0.0, 0.8), (0.0, 1.0))).await;
        assert_eq!(autobright.display.writes, vec![0.8]);
    }

    #[tokio::test]
    async fn missing_reading_touches_nothing() {
        let mut autobright = engine(None, StubActuator::at(0.1), StubActuator::at(0.1));
        let result = autobright.run_cycle(&cycle((0.0, 1.0), (0.0, 1.0))).await;

        assert_eq!(result.ambient, None);
        assert_eq!(result.display_target, None);
        assert_eq!(autobright.display.calls(), 0);
        assert_eq!(autobright.keyboard.calls(), 0);
        assert_eq!(autobright.last_result(), Some(result));
    }

    #[tokio::test]
    async fn keyboard_never_touched_without_capability() {
        let keyboard = StubActuator {
            available: false,
            current: Some(0.9),
            ..Default::default()
        };
        let mut autobright = engine(Some(0.0), StubActuator::at(0.1), keyboard);
        assert!(!autobright.capabilities().keyboard_control_available);

        autobright.run_cycle(&cycle((0.0, 1.0), (0.0, 1.0))).await;
        assert_eq!(autobright.keyboard.calls(), 0);
    }

    #[tokio::test]
    async fn disabled_targets_are_skipped() {
        let mut autobright = engine(Some(0.9), StubActuator::at(0.1), StubActuator::at(0.1));
        let config = CycleConfig {
            adjust_display: false,
            adjust_keyboard: false,
            ..cycle((0.0, 1.0), (0.0, 1.0))
        };
        let result = autobright.run_cycle(&config).await;

        assert_eq!(result.ambient, Some(0.9));
        assert_eq!(autobright.display.calls(), 0);
        assert_eq!(autobright.keyboard.calls(), 0);
    }

    #[tokio::test]
    async fn inverted_range_dims_in_daylight() {
        let mut autobright = engine(Some(1.0), StubActuator::at(0.5), StubActuator::at(0.5));
        autobright.run_cycle(&cycle((0.15, 0.95), (1.0, 0.0))).await;
        assert_eq!(autobright.keyboard.writes, vec![0.0]);
    }

    #[tokio::test]
    async fn subscribers_see_each_cycle() {
        let mut autobright = engine(Some(0.3), StubActuator::at(0.3), StubActuator::at(0.3));
        let mut results = autobright.subscribe();
        assert_eq!(*results.borrow(), None);

        autobright.run_cycle(&cycle((0.0, 1.0), (0.0, 1.0))).await;
        assert!(results.has_changed().unwrap());
        let latest = *results.borrow_and_update();
        assert_eq!(latest.map(|result| result.ambient), Some(Some(0.3)));
    }

    #[tokio::test]
    async fn loop_needs_a_sensor() {
        let mut autobright = Autobright::new(
            StubSensor {
                level: None,
                available: false,
            },
            StubActuator::at(0.5),
            StubActuator::default(),
        );
        assert!(!autobright.capabilities().sensor_available);
        assert!(!autobright.start_loop(Duration::from_secs(5)));
        assert!(!autobright.is_running());
        assert!(!autobright.next_tick().await);
    }

    #[tokio::test]
    async fn loop_ticks_immediately_then_stops() {
        let mut autobright = engine(Some(0.3), StubActuator::at(0.3), StubActuator::default());
        assert!(autobright.start_loop(Duration::ZERO));
        assert!(autobright.is_running());
        assert!(autobright.next_tick().await);

        autobright.stop_loop();
        assert!(!autobright.is_running());
        assert!(!autobright.next_tick().await);
    }
}
