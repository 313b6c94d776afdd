//! Easing curves
//!
//! The tween engine only needs a `Fn(f32) -> f32` over `[0, 1]`; this module
//! provides the stock curve set so callers don't have to write their own.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

/// Shared easing capability consumed by the engine
///
/// Maps normalized progress in `[0, 1]` to an eased scalar.
pub type EasingFn = Arc<dyn Fn(f32) -> f32 + Send + Sync>;

/// Stock easing curves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Easing {
    Linear,
    EaseInSine,
    EaseOutSine,
    EaseInOutSine,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    #[default]
    EaseInOutCubic,
    EaseInQuart,
    EaseOutQuart,
    EaseInOutQuart,
    EaseInQuint,
    EaseOutQuint,
    EaseInOutQuint,
}

impl Easing {
    /// Apply the curve to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInSine => 1.0 - (t * FRAC_PI_2).cos(),
            Easing::EaseOutSine => (t * FRAC_PI_2).sin(),
            Easing::EaseInOutSine => (1.0 - (t * std::f32::consts::PI).cos()) / 2.0,
            Easing::EaseInQuad => power_in(t, 2),
            Easing::EaseOutQuad => power_out(t, 2),
            Easing::EaseInOutQuad => power_in_out(t, 2),
            Easing::EaseInCubic => power_in(t, 3),
            Easing::EaseOutCubic => power_out(t, 3),
            Easing::EaseInOutCubic => power_in_out(t, 3),
            Easing::EaseInQuart => power_in(t, 4),
            Easing::EaseOutQuart => power_out(t, 4),
            Easing::EaseInOutQuart => power_in_out(t, 4),
            Easing::EaseInQuint => power_in(t, 5),
            Easing::EaseOutQuint => power_out(t, 5),
            Easing::EaseInOutQuint => power_in_out(t, 5),
        }
    }

    /// Wrap the curve as the engine's easing capability
    pub fn into_fn(self) -> EasingFn {
        Arc::new(move |t| self.apply(t))
    }
}

impl From<Easing> for EasingFn {
    fn from(easing: Easing) -> Self {
        easing.into_fn()
    }
}

#[inline]
fn power_in(t: f32, exp: i32) -> f32 {
    t.powi(exp)
}

#[inline]
fn power_out(t: f32, exp: i32) -> f32 {
    1.0 - (1.0 - t).powi(exp)
}

/// Symmetric in-out: scaled ease-in for the first half, mirrored ease-out after
#[inline]
fn power_in_out(t: f32, exp: i32) -> f32 {
    if t < 0.5 {
        2f32.powi(exp - 1) * t.powi(exp)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(exp) / 2.0
    }
}
