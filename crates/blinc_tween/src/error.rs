//! Error types for blinc_tween

use thiserror::Error;

/// Configuration errors rejected before a tween or clock is built
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenError {
    /// A tween cycle must take some time, otherwise progress is undefined
    #[error("tween duration must be greater than zero")]
    ZeroDuration,

    /// A tween must run at least one cycle
    #[error("repeat count must be at least 1")]
    ZeroRepeat,

    /// Frame clocks tick at `1000 / rate` ms, so the rate must be positive
    #[error("invalid frame rate: {0} (must be greater than zero)")]
    InvalidFrameRate(u32),
}

/// Result type for blinc_tween operations
pub type Result<T> = std::result::Result<T, TweenError>;
