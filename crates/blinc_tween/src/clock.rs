//! Shared frame clock
//!
//! Every tween is driven by a [`FrameClock`] rather than by a timer of its
//! own. A clock multiplexes one tick source over any number of consumers:
//!
//! - **Timer clocks** run a background thread at `1000 / rate` ms per frame.
//!   The thread is started by the first [`FrameClock::attach`] and stopped
//!   when the last consumer detaches. Re-attaching starts a fresh thread, so
//!   no backlog of missed frames is ever delivered.
//! - **Manual clocks** have no thread; the host drives them with
//!   [`FrameClock::advance`], e.g. from its own render loop.
//!
//! Process-wide timer clocks are created lazily, one per rate, through
//! [`FrameClock::shared`] and [`FrameClock::current`].

use crate::error::{Result, TweenError};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

// ============================================================================
// Global Frame Clock State
// ============================================================================

/// Frame rate used when none has been configured
pub const DEFAULT_FRAME_RATE: u32 = 20;

static FRAME_RATE: AtomicU32 = AtomicU32::new(DEFAULT_FRAME_RATE);

/// Process-wide timer clocks, one per rate
static SHARED_CLOCKS: LazyLock<Mutex<FxHashMap<u32, FrameClock>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Set the process-wide frame rate
///
/// Only affects clocks resolved afterwards through [`FrameClock::current`].
/// A clock that already exists for another rate keeps ticking at its own rate.
pub fn set_frame_rate(fps: u32) -> Result<()> {
    if fps == 0 {
        return Err(TweenError::InvalidFrameRate(fps));
    }
    FRAME_RATE.store(fps, Ordering::Relaxed);
    tracing::debug!("FrameClock: default frame rate set to {}", fps);
    Ok(())
}

/// Get the process-wide frame rate
pub fn frame_rate() -> u32 {
    FRAME_RATE.load(Ordering::Relaxed)
}

// ============================================================================
// Ticks and Consumers
// ============================================================================

/// A single frame delivered by a [`FrameClock`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTick {
    /// Time actually elapsed since the previous tick
    pub interval: Duration,
}

/// Callback invoked once per tick
pub type TickCallback = Arc<dyn Fn(FrameTick) + Send + Sync>;

new_key_type! {
    /// Handle to a consumer attached to a frame clock
    pub struct ConsumerId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Driver {
    Timer,
    Manual,
}

struct ClockState {
    consumers: SlotMap<ConsumerId, TickCallback>,
    worker: Option<Worker>,
}

/// Handle to a running timer thread
struct Worker {
    stop_flag: Arc<AtomicBool>,
    thread: Thread,
}

impl Worker {
    /// Must be called with the clock state locked so that a stopped thread
    /// can never snapshot consumers attached after it was stopped.
    fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

struct ClockInner {
    rate: u32,
    period: Duration,
    driver: Driver,
    state: Mutex<ClockState>,
}

impl ClockInner {
    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self, id: ConsumerId) {
        let removed = {
            let mut state = self.state();
            let removed = state.consumers.remove(id);
            if removed.is_some() && state.consumers.is_empty() {
                if let Some(worker) = state.worker.take() {
                    // The thread exits on its own once it sees the flag; it is
                    // never joined because the last detach may run on it.
                    worker.signal_stop();
                    tracing::debug!(
                        "FrameClock({}fps): last consumer detached, timer stopped",
                        self.rate
                    );
                }
            }
            removed
        };
        // A callback may own the last handle to its consumer; never drop it
        // under the clock lock.
        drop(removed);
    }

    /// Deliver a tick to a snapshot of the current consumers
    ///
    /// Callbacks run without the clock lock held, so they may attach or
    /// detach freely. Returns false if `stop_flag` was raised.
    fn dispatch(&self, tick: FrameTick, stop_flag: Option<&AtomicBool>) -> bool {
        let callbacks: SmallVec<[TickCallback; 8]> = {
            let state = self.state();
            if stop_flag.is_some_and(|flag| flag.load(Ordering::Acquire)) {
                return false;
            }
            state.consumers.values().cloned().collect()
        };

        for callback in callbacks {
            callback(tick);
        }
        true
    }
}

impl Drop for ClockInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = state.worker.take() {
            worker.signal_stop();
        }
    }
}

// ============================================================================
// Frame Clock
// ============================================================================

/// A ref-counted periodic tick source shared by many consumers
#[derive(Clone)]
pub struct FrameClock {
    inner: Arc<ClockInner>,
}

impl FrameClock {
    /// Get the process-wide timer clock for `rate` frames per second
    ///
    /// The clock is created on first use and lives for the rest of the
    /// process; its thread only runs while consumers are attached.
    pub fn shared(rate: u32) -> Result<Self> {
        if rate == 0 {
            return Err(TweenError::InvalidFrameRate(rate));
        }
        let mut clocks = SHARED_CLOCKS
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let clock = clocks
            .entry(rate)
            .or_insert_with(|| Self::with_driver(rate, Driver::Timer));
        Ok(clock.clone())
    }

    /// Get the process-wide timer clock for the configured [`frame_rate`]
    pub fn current() -> Self {
        let rate = frame_rate();
        // The configured rate is validated by `set_frame_rate`
        Self::shared(rate)
            .unwrap_or_else(|_| Self::with_driver(DEFAULT_FRAME_RATE, Driver::Timer))
    }

    /// Create a private timer clock that is not shared through the registry
    pub fn new(rate: u32) -> Result<Self> {
        if rate == 0 {
            return Err(TweenError::InvalidFrameRate(rate));
        }
        Ok(Self::with_driver(rate, Driver::Timer))
    }

    /// Create a clock without a timer thread, driven by [`FrameClock::advance`]
    ///
    /// `rate` only sets the nominal step used by [`FrameClock::advance_frame`].
    pub fn manual(rate: u32) -> Result<Self> {
        if rate == 0 {
            return Err(TweenError::InvalidFrameRate(rate));
        }
        Ok(Self::with_driver(rate, Driver::Manual))
    }

    fn with_driver(rate: u32, driver: Driver) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                rate,
                period: Duration::from_nanos(1_000_000_000 / rate as u64),
                driver,
                state: Mutex::new(ClockState {
                    consumers: SlotMap::with_key(),
                    worker: None,
                }),
            }),
        }
    }

    /// Nominal frames per second
    pub fn rate(&self) -> u32 {
        self.inner.rate
    }

    /// Nominal time between ticks
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Whether this clock is driven by the host rather than a thread
    pub fn is_manual(&self) -> bool {
        self.inner.driver == Driver::Manual
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.inner.state().consumers.len()
    }

    /// Whether the clock is currently producing ticks
    ///
    /// For timer clocks this means the background thread is alive; manual
    /// clocks count as running while anyone is attached.
    pub fn is_running(&self) -> bool {
        let state = self.inner.state();
        match self.inner.driver {
            Driver::Timer => state.worker.is_some(),
            Driver::Manual => !state.consumers.is_empty(),
        }
    }

    /// Check whether two handles refer to the same clock
    pub fn ptr_eq(&self, other: &FrameClock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach a consumer, starting the timer if this is the first one
    pub fn attach<F>(&self, callback: F) -> ClockSubscription
    where
        F: Fn(FrameTick) + Send + Sync + 'static,
    {
        let mut state = self.inner.state();
        let id = state.consumers.insert(Arc::new(callback));

        if self.inner.driver == Driver::Timer && state.worker.is_none() {
            state.worker = spawn_worker(&self.inner);
        }

        ClockSubscription {
            clock: Arc::clone(&self.inner),
            id,
            released: AtomicBool::new(false),
        }
    }

    /// Deliver one tick of `interval` to every attached consumer
    ///
    /// Runs the consumers on the calling thread. Intended for manual clocks,
    /// but works on timer clocks too.
    pub fn advance(&self, interval: Duration) {
        self.inner.dispatch(FrameTick { interval }, None);
    }

    /// Deliver one tick of exactly [`FrameClock::period`]
    pub fn advance_frame(&self) {
        self.advance(self.inner.period);
    }
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("rate", &self.inner.rate)
            .field("driver", &self.inner.driver)
            .field("consumers", &self.consumer_count())
            .finish()
    }
}

fn spawn_worker(inner: &Arc<ClockInner>) -> Option<Worker> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let weak = Arc::downgrade(inner);
    let period = inner.period;
    let thread_flag = Arc::clone(&stop_flag);

    let spawned = thread::Builder::new()
        .name(format!("blinc-frame-clock-{}", inner.rate))
        .spawn(move || run_timer(weak, period, thread_flag));

    match spawned {
        Ok(handle) => {
            tracing::debug!("FrameClock({}fps): timer started", inner.rate);
            Some(Worker {
                stop_flag,
                thread: handle.thread().clone(),
            })
        }
        Err(err) => {
            // Retried on the next attach
            tracing::error!(
                "FrameClock({}fps): failed to spawn timer thread: {}",
                inner.rate,
                err
            );
            None
        }
    }
}

/// Timer thread body
///
/// Sleeps until the next frame deadline, then dispatches the real elapsed
/// time since the previous tick. A late frame pushes the schedule forward
/// instead of bursting to catch up.
fn run_timer(clock: Weak<ClockInner>, period: Duration, stop_flag: Arc<AtomicBool>) {
    let _guard = TimerGuard {
        clock: clock.clone(),
        stop_flag: Arc::clone(&stop_flag),
    };
    let mut last = Instant::now();
    let mut deadline = last + period;

    loop {
        loop {
            if stop_flag.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }

        let now = Instant::now();
        let tick = FrameTick {
            interval: now - last,
        };
        last = now;
        deadline += period;
        if deadline <= now {
            deadline = now + period;
        }

        let Some(inner) = clock.upgrade() else {
            return;
        };
        if !inner.dispatch(tick, Some(&stop_flag)) {
            return;
        }
    }
}

/// Forgets the worker if a consumer panics on the timer thread
///
/// The next [`FrameClock::attach`] then starts a fresh thread instead of
/// finding a dead one registered.
struct TimerGuard {
    clock: Weak<ClockInner>,
    stop_flag: Arc<AtomicBool>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        let Some(inner) = self.clock.upgrade() else {
            return;
        };
        let mut state = inner.state();
        let ours = state
            .worker
            .as_ref()
            .is_some_and(|worker| Arc::ptr_eq(&worker.stop_flag, &self.stop_flag));
        if ours {
            state.worker = None;
            tracing::error!(
                "FrameClock({}fps): consumer panicked, timer thread lost",
                inner.rate
            );
        }
    }
}

// ============================================================================
// Clock Subscription
// ============================================================================

/// Keeps a consumer attached to a [`FrameClock`]
///
/// Detaches on [`ClockSubscription::release`] or when dropped.
#[must_use = "dropping a ClockSubscription detaches the consumer"]
pub struct ClockSubscription {
    clock: Arc<ClockInner>,
    id: ConsumerId,
    released: AtomicBool,
}

impl ClockSubscription {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Detach the consumer; later calls are no-ops
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.clock.detach(self.id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ClockSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSubscription")
            .field("rate", &self.clock.rate)
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for ClockSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
