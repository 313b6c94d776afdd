//! Blinc Tween Engine
//!
//! Time-bounded interpolation driven by a shared frame clock, with
//! broadcast delivery to any number of observers.
//!
//! # Features
//!
//! - **Shared Frame Clock**: One ref-counted tick source per frame rate,
//!   running only while something is attached
//! - **Lazy Tweens**: A tween starts on its first subscriber and leaves the
//!   clock when the last one detaches
//! - **Delays and Repeats**: Pre-delay, post-delay hold and repeat cycles
//! - **Pause / Resume**: Paused time is not counted
//! - **Typed Values**: Any type via a conversion function; [`Interpolate`]
//!   types get linear conversion for free
//!
//! # Example
//!
//! ```ignore
//! use blinc_tween::{create, set_frame_rate};
//! use std::time::Duration;
//!
//! set_frame_rate(60)?;
//!
//! let tween = create(0.0, 10.0, Duration::from_secs(1))?;
//! let sub = tween.subscribe_with(
//!     |value| println!("value: {value}"),
//!     || println!("done"),
//! );
//! ```

pub mod clock;
pub mod easing;
pub mod error;
pub mod observer;
pub mod tween;
pub mod values;

pub use clock::{
    frame_rate, set_frame_rate, ClockSubscription, ConsumerId, FrameClock, FrameTick,
    TickCallback, DEFAULT_FRAME_RATE,
};
pub use easing::{Easing, EasingFn};
pub use error::{Result, TweenError};
pub use observer::{Observer, ObserverId, Subscription};
pub use tween::{create, Tween, TweenBuilder};
pub use values::{lerp, sine_lerp, ConvertFn, Interpolate};
