//! Value conversion
//!
//! The engine is generic over the tweened type; it never does arithmetic on
//! `T` itself. Instead each tween carries a conversion capability that maps
//! `(begin, end, eased)` to a `T`. Types implementing [`Interpolate`] get a
//! linear conversion for free.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

/// Shared conversion capability: `(begin, end, eased scalar) -> T`
pub type ConvertFn<T> = Arc<dyn Fn(&T, &T, f32) -> T + Send + Sync>;

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone {
    /// Linearly interpolate between self and other by factor t
    ///
    /// `t` is usually in `[0, 1]` but overshooting curves may leave it.
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        lerp(*self, *other, t)
    }
}

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t as f64
    }
}

impl<const N: usize> Interpolate for [f32; N] {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        std::array::from_fn(|i| lerp(self[i], other[i], t))
    }
}

/// Linear conversion for any [`Interpolate`] type
pub fn linear<T: Interpolate + 'static>() -> ConvertFn<T> {
    Arc::new(|begin: &T, end: &T, t| begin.lerp(end, t))
}

/// `(to - from) * step + from`
#[inline]
pub fn lerp(from: f32, to: f32, step: f32) -> f32 {
    (to - from) * step + from
}

/// Like [`lerp`] but the step is bent through a quarter sine wave
///
/// Starts fast and settles into `to`.
#[inline]
pub fn sine_lerp(from: f32, to: f32, step: f32) -> f32 {
    (to - from) * (FRAC_PI_2 * step).sin() + from
}
