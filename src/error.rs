//! Error types returned by the strip controller and render engines.
//!
//! Every failure is a plain value handed back to the caller. Nothing in
//! this crate aborts the process; the caller decides what a failed
//! `begin` or `set_pixel` means for it.

/// Result alias used by every public controller operation.
pub type StripResult<T> = Result<T, StripError>;

/// Status values for the public operation surface.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StripError {
    /// Channel index outside {0, 1}.
    #[error("unsupported channel number {0} (expected 0 or 1)")]
    ChannelRange(usize),

    /// GPIO pin above 31.
    #[error("unsupported gpio pin {0} (expected 0..=31)")]
    BadPin(u32),

    /// LED index outside the channel's configured pixel count.
    #[error("led {led} not in range (channel has {count} leds)")]
    BadParam { led: u32, count: u32 },

    /// Channel or controller is not in the state the operation requires.
    #[error("strip not initialised")]
    NotInitialized,

    /// Render engine refused to start or did not allocate a required buffer.
    #[error("strip initialisation failed: {0}")]
    InitFailed(String),
}

impl StripError {
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }
}

/// Failures reported by a [`RenderEngine`](crate::engine::RenderEngine).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine start failed: {0}")]
    Start(String),

    #[error("engine render failed: {0}")]
    Render(String),
}
