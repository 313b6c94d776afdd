//! Tween engine
//!
//! A [`Tween`] interpolates from `begin` to `end` over `duration`, sampled
//! once per [`FrameClock`] tick, and broadcasts each value to its observers.
//!
//! Tweens are lazy. Building one has no side effects; the first subscriber
//! resets the elapsed time and attaches the tween to its clock, and the last
//! one to leave detaches it again.
//!
//! # Timing
//!
//! Each tick adds its interval to `elapsed`. Progress is derived as:
//!
//! ```text
//! adjusted = elapsed - delay_before
//! adjusted < 0                          => nothing emitted (pre-delay)
//! adjusted >= duration + delay_after    => cycle finished
//! otherwise                             => min(adjusted / duration, 1.0)
//! ```
//!
//! Ticks whose progress equals the previous one are dropped, so the end value
//! is emitted once and then held through the post-delay. A finished cycle
//! emits the end value once more and either completes the tween or rewinds
//! `elapsed` to `delay_before` for the next repeat.
//!
//! # Example
//!
//! ```ignore
//! use blinc_tween::{Easing, Tween};
//! use std::time::Duration;
//!
//! let fade = Tween::builder(0.0_f32, 1.0, Duration::from_millis(300))
//!     .easing(Easing::EaseOutQuad)
//!     .delay_before(Duration::from_millis(100))
//!     .build()?;
//!
//! let sub = fade.subscribe_with(
//!     |opacity| println!("opacity {opacity}"),
//!     || println!("done"),
//! );
//! ```

use crate::clock::{ClockSubscription, FrameClock, FrameTick};
use crate::easing::{Easing, EasingFn};
use crate::error::{Result, TweenError};
use crate::observer::{FnObserver, Observer, ObserverId, ObserverRegistry, Subscription};
use crate::values::{self, ConvertFn, Interpolate};
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Progress reported once a cycle including its post-delay has fully elapsed
const CYCLE_FINISHED: f32 = 2.0;

/// Create a float tween with linear conversion and the default easing
pub fn create(begin: f32, end: f32, duration: Duration) -> Result<Tween<f32>> {
    Tween::builder(begin, end, duration).build()
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and builds a [`Tween`]
pub struct TweenBuilder<T> {
    begin: T,
    end: T,
    duration: Duration,
    easing: EasingFn,
    convert: ConvertFn<T>,
    repeat: u32,
    delay_before: Duration,
    delay_after: Duration,
    clock: Option<FrameClock>,
}

impl<T: Send + Sync + 'static> TweenBuilder<T> {
    /// Start a builder for any type, given how to produce a `T` from
    /// `(begin, end, eased)`
    pub fn with_conversion<F>(begin: T, end: T, duration: Duration, convert: F) -> Self
    where
        F: Fn(&T, &T, f32) -> T + Send + Sync + 'static,
    {
        Self::from_parts(begin, end, duration, Arc::new(convert))
    }

    fn from_parts(begin: T, end: T, duration: Duration, convert: ConvertFn<T>) -> Self {
        Self {
            begin,
            end,
            duration,
            easing: Easing::default().into_fn(),
            convert,
            repeat: 1,
            delay_before: Duration::ZERO,
            delay_after: Duration::ZERO,
            clock: None,
        }
    }

    /// Use one of the stock curves
    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing.into_fn();
        self
    }

    /// Use a custom curve mapping progress in `[0, 1]` to an eased scalar
    pub fn easing_fn<F>(mut self, easing: F) -> Self
    where
        F: Fn(f32) -> f32 + Send + Sync + 'static,
    {
        self.easing = Arc::new(easing);
        self
    }

    /// Number of cycles to run (default 1)
    pub fn repeat(mut self, count: u32) -> Self {
        self.repeat = count;
        self
    }

    /// Wait before the first cycle starts moving
    pub fn delay_before(mut self, delay: Duration) -> Self {
        self.delay_before = delay;
        self
    }

    /// Hold the end value this long before a cycle counts as finished
    pub fn delay_after(mut self, delay: Duration) -> Self {
        self.delay_after = delay;
        self
    }

    /// Drive the tween from a specific clock
    ///
    /// Defaults to the process-wide clock for the configured frame rate,
    /// resolved when the tween first starts.
    pub fn clock(mut self, clock: FrameClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and build an idle tween
    pub fn build(self) -> Result<Tween<T>> {
        if self.duration.is_zero() {
            return Err(TweenError::ZeroDuration);
        }
        if self.repeat == 0 {
            return Err(TweenError::ZeroRepeat);
        }

        Ok(Tween {
            inner: Arc::new(TweenInner {
                begin: self.begin,
                end: self.end,
                duration: self.duration,
                delay_before: self.delay_before,
                delay_after: self.delay_after,
                cycle_end: self.duration.saturating_add(self.delay_after),
                easing: self.easing,
                convert: self.convert,
                clock: self.clock,
                state: Mutex::new(TweenState {
                    elapsed: Duration::ZERO,
                    remaining: self.repeat,
                    running: false,
                    completed: false,
                    last_progress: None,
                    observers: IndexMap::new(),
                    next_observer: 0,
                    clock_subscription: None,
                }),
            }),
        })
    }
}

// ============================================================================
// Engine State
// ============================================================================

/// Mutable per-tween state, guarded by one mutex per tween
struct TweenState<T> {
    elapsed: Duration,
    /// Cycles left, including the current one
    remaining: u32,
    /// Pause gate: ticks are ignored while false
    running: bool,
    completed: bool,
    last_progress: Option<f32>,
    /// Kept in registration order
    observers: IndexMap<ObserverId, Arc<dyn Observer<T>>>,
    next_observer: u64,
    /// Present exactly while `observers` is non-empty
    clock_subscription: Option<ClockSubscription>,
}

struct TweenInner<T> {
    begin: T,
    end: T,
    duration: Duration,
    delay_before: Duration,
    delay_after: Duration,
    /// `duration + delay_after`, saturated
    cycle_end: Duration,
    easing: EasingFn,
    convert: ConvertFn<T>,
    clock: Option<FrameClock>,
    state: Mutex<TweenState<T>>,
}

/// What a tick decided, carried out after the lock is released
struct Emission<T> {
    progress: f32,
    observers: Vec<Arc<dyn Observer<T>>>,
    completed: bool,
    /// Clock attachment given up by the final cycle
    detached: Option<ClockSubscription>,
}

impl<T: Send + Sync + 'static> TweenInner<T> {
    fn state(&self) -> MutexGuard<'_, TweenState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_tick(&self, tick: FrameTick) {
        let emission = {
            let mut state = self.state();
            match self.advance(&mut state, tick.interval) {
                Some(emission) => emission,
                None => return,
            }
        };

        let eased = (self.easing)(emission.progress.min(1.0));
        let value = (self.convert)(&self.begin, &self.end, eased);

        for observer in &emission.observers {
            observer.on_next(&value);
        }

        if emission.completed {
            for observer in emission.observers.iter().rev() {
                observer.on_completed();
            }
        }
        drop(emission.detached);
    }

    /// Accumulate one tick and decide what to emit
    fn advance(&self, state: &mut TweenState<T>, interval: Duration) -> Option<Emission<T>> {
        if !state.running || state.completed || state.clock_subscription.is_none() {
            return None;
        }

        state.elapsed = state.elapsed.saturating_add(interval);

        let adjusted = state.elapsed.checked_sub(self.delay_before)?;
        let progress = if adjusted >= self.cycle_end {
            CYCLE_FINISHED
        } else {
            (adjusted.as_secs_f64() / self.duration.as_secs_f64()).min(1.0) as f32
        };

        if state.last_progress == Some(progress) {
            return None;
        }
        state.last_progress = Some(progress);

        let observers: Vec<_> = state.observers.values().cloned().collect();
        let mut detached = None;

        if progress > 1.0 {
            state.remaining -= 1;
            if state.remaining == 0 {
                state.completed = true;
                state.running = false;
                state.observers.clear();
                detached = state.clock_subscription.take();
                tracing::debug!("Tween: completed after {:?}", state.elapsed);
            } else {
                state.elapsed = self.delay_before;
                // A tick longer than a whole cycle must still finish the next one
                state.last_progress = None;
                tracing::trace!("Tween: cycle finished, {} remaining", state.remaining);
            }
        }

        Some(Emission {
            progress,
            observers,
            completed: state.completed,
            detached,
        })
    }
}

impl<T: Send + Sync + 'static> ObserverRegistry for TweenInner<T> {
    fn remove_observer(&self, id: ObserverId) {
        let detached = {
            let mut state = self.state();
            if state.observers.shift_remove(&id).is_none() || !state.observers.is_empty() {
                return;
            }
            state.clock_subscription.take()
        };

        if detached.is_some() {
            tracing::debug!("Tween: last observer detached, leaving clock");
        }
    }
}

// ============================================================================
// Tween Handle
// ============================================================================

/// Handle to a tween; clones share the same engine
pub struct Tween<T> {
    inner: Arc<TweenInner<T>>,
}

impl<T> Clone for Tween<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Interpolate + Send + Sync + 'static> Tween<T> {
    /// Start a builder with linear conversion between `begin` and `end`
    pub fn builder(begin: T, end: T, duration: Duration) -> TweenBuilder<T> {
        TweenBuilder::from_parts(begin, end, duration, values::linear())
    }
}

impl<T: Send + Sync + 'static> Tween<T> {
    /// Attach an observer
    ///
    /// The first observer starts the tween: `elapsed` is reset to zero, the
    /// pause gate opens and the tween attaches to its clock. Later observers
    /// join the running tween without resetting anything.
    ///
    /// Subscribing to a completed tween delivers `on_completed` right away
    /// and returns an already released subscription.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        let observer: Arc<dyn Observer<T>> = Arc::new(observer);

        let mut state = self.inner.state();
        if state.completed {
            drop(state);
            observer.on_completed();
            return Subscription::released();
        }

        if state.observers.is_empty() {
            self.start(&mut state);
        }

        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.insert(id, observer);
        drop(state);

        let registry: Arc<dyn ObserverRegistry> = self.inner.clone();
        Subscription::new(registry, id)
    }

    /// Attach a closure receiving each value
    pub fn subscribe_fn<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(FnObserver {
            on_next,
            on_completed: || {},
        })
    }

    /// Attach closures receiving each value and the completion
    pub fn subscribe_with<F, C>(&self, on_next: F, on_completed: C) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe(FnObserver {
            on_next,
            on_completed,
        })
    }

    fn start(&self, state: &mut TweenState<T>) {
        state.elapsed = Duration::ZERO;
        state.last_progress = None;
        state.running = true;

        if state.clock_subscription.is_some() {
            return;
        }

        // The clock owns the engine until the attachment is dropped, so
        // detached observers still see the tween through to completion.
        let clock = self.inner.clock.clone().unwrap_or_else(FrameClock::current);
        let inner = Arc::clone(&self.inner);
        state.clock_subscription = Some(clock.attach(move |tick| inner.on_tick(tick)));
        tracing::debug!("Tween: started on {}fps clock", clock.rate());
    }

    /// Stop accumulating time; ticks keep arriving but are ignored
    pub fn pause(&self) {
        self.inner.state().running = false;
    }

    /// Continue accumulating from the preserved elapsed time
    pub fn resume(&self) {
        let mut state = self.inner.state();
        if !state.completed {
            state.running = true;
        }
    }

    pub fn begin(&self) -> &T {
        &self.inner.begin
    }

    pub fn end(&self) -> &T {
        &self.inner.end
    }

    /// Length of one cycle, excluding delays
    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn delay_before(&self) -> Duration {
        self.inner.delay_before
    }

    pub fn delay_after(&self) -> Duration {
        self.inner.delay_after
    }

    /// Time accumulated since the last reset, including the pre-delay
    pub fn elapsed(&self) -> Duration {
        self.inner.state().elapsed
    }

    /// Cycles left, including the one in progress
    pub fn remaining_repeats(&self) -> u32 {
        self.inner.state().remaining
    }

    /// Whether ticks are currently being accumulated
    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    /// Whether the tween is attached to its clock
    pub fn is_active(&self) -> bool {
        self.inner.state().clock_subscription.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.state().completed
    }

    pub fn observer_count(&self) -> usize {
        self.inner.state().observers.len()
    }
}

impl<T: fmt::Debug + Send + Sync + 'static> fmt::Debug for Tween<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Tween")
            .field("begin", &self.inner.begin)
            .field("end", &self.inner.end)
            .field("duration", &self.inner.duration)
            .field("elapsed", &state.elapsed)
            .field("remaining", &state.remaining)
            .field("running", &state.running)
            .field("completed", &state.completed)
            .field("observers", &state.observers.len())
            .finish()
    }
}
