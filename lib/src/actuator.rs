/// A brightness target the control loop can drive.
///
/// Failures never surface as errors here: an unreadable value is `None` and a
/// failed write is `false`, both of which only affect the current cycle.
#[allow(async_fn_in_trait)]
pub trait BrightnessControl {
    fn is_available(&self) -> bool;

    /// Current brightness in 0.0..=1.0.
    async fn get(&mut self) -> Option<f64>;

    /// Clamp `value` to 0.0..=1.0 and apply it, returning whether the write went through.
    async fn set(&mut self, value: f64) -> bool;
}
