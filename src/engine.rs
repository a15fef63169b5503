//! Render engine boundary: the component that turns pixel buffers into a
//! timed signal on the wire.
//!
//! The controller never talks to hardware directly. It hands an
//! [`EngineConfig`] to [`RenderEngine::start`], receives one buffer per
//! configured channel, and gives the buffers back (borrowed) on every
//! [`RenderEngine::render`]. Real hardware lives behind the `hardware`
//! feature; [`SimulatedEngine`] keeps frames in memory.

use crate::channel::{CHANNEL_COUNT, ChannelConfig};
use crate::error::EngineError;
use serde::Serialize;

/// Global and per-channel parameters passed to the engine at start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub frequency: u32,
    pub dma_channel: u8,
    pub render_wait_time: u8,
    pub channels: [ChannelConfig; CHANNEL_COUNT],
}

/// Buffers handed out by a successful start, indexed by channel.
/// `None` means the engine did not allocate for that channel.
pub type Allocation = [Option<Vec<u32>>; CHANNEL_COUNT];

/// One frame: the current pixels of each active channel.
pub type Frame<'a> = [Option<&'a [u32]>; CHANNEL_COUNT];

/// The signal generator shared by both channels.
///
/// # Rust concept: traits at the hardware seam
/// The controller is generic over this trait, so tests drive it with an
/// in-memory engine while the binary plugs in the Raspberry Pi driver.
pub trait RenderEngine {
    /// Claim the hardware and allocate buffers for every channel in use.
    fn start(&mut self, config: &EngineConfig) -> Result<Allocation, EngineError>;

    /// Transmit one frame. Blocks until the transmission finished.
    fn render(&mut self, frame: Frame<'_>) -> Result<(), EngineError>;

    /// Release the hardware.
    fn stop(&mut self);
}

// ── Simulated engine ─────────────────────────────────────────────────

/// In-memory engine with fault injection.
///
/// Allocates `pixel_count` slots per channel in use (pre-filled with
/// garbage so zero-filling is observable) and records the last frame.
#[derive(Debug, Default)]
pub struct SimulatedEngine {
    pub fail_start: bool,
    pub fail_render: bool,
    /// Channels the engine refuses to allocate for.
    pub withhold: [bool; CHANNEL_COUNT],
    /// Allocate this many slots fewer than requested.
    pub shortfall: u32,

    running: bool,
    starts: usize,
    stops: usize,
    frames: usize,
    last_config: Option<EngineConfig>,
    last_frame: [Option<Vec<u32>>; CHANNEL_COUNT],
}

const GARBAGE: u32 = 0xDEAD_BEEF;

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Frames successfully transmitted.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last_config(&self) -> Option<&EngineConfig> {
        self.last_config.as_ref()
    }

    pub fn last_frame(&self, channel: usize) -> Option<&[u32]> {
        self.last_frame.get(channel)?.as_deref()
    }
}

impl RenderEngine for SimulatedEngine {
    fn start(&mut self, config: &EngineConfig) -> Result<Allocation, EngineError> {
        if self.fail_start {
            return Err(EngineError::Start("simulated start failure".to_string()));
        }
        if self.running {
            return Err(EngineError::Start("engine already running".to_string()));
        }
        self.running = true;
        self.starts += 1;
        self.last_config = Some(*config);

        let mut allocation: Allocation = Default::default();
        for (index, channel) in config.channels.iter().enumerate() {
            if channel.in_use() && !self.withhold[index] {
                let len = channel.pixel_count.saturating_sub(self.shortfall) as usize;
                allocation[index] = Some(vec![GARBAGE; len]);
            }
        }
        tracing::debug!(
            "simulated engine started at {} Hz on dma {}",
            config.frequency,
            config.dma_channel
        );
        Ok(allocation)
    }

    fn render(&mut self, frame: Frame<'_>) -> Result<(), EngineError> {
        if !self.running {
            return Err(EngineError::Render("engine not running".to_string()));
        }
        if self.fail_render {
            return Err(EngineError::Render("simulated render failure".to_string()));
        }
        for (slot, pixels) in self.last_frame.iter_mut().zip(frame) {
            *slot = pixels.map(<[u32]>::to_vec);
        }
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.stops += 1;
            tracing::debug!("simulated engine stopped");
        }
    }
}
