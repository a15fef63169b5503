//! Two-channel WS281x/SK6812 LED strip controller.
//!
//! This crate drives one or two LED strips through a shared signal
//! generator (the "render engine"):
//! - `channel` / `controller`: channel descriptors and the lifecycle
//!   (configure → begin → set pixels / render → end)
//! - `registry` / `loader`: the `key=value` configuration vocabulary and
//!   the best-effort file loader
//! - `engine`: the render engine trait and an in-memory engine
//! - `ws281x` (feature `hardware`): the Raspberry Pi driver
//!
//! It also provides the color and shutdown helpers used by the binary.

pub mod channel;
pub mod controller;
pub mod engine;
pub mod error;
pub mod loader;
pub mod registry;
#[cfg(feature = "hardware")]
pub mod ws281x;

pub use channel::{CHANNEL_COUNT, Channel, ChannelConfig, ChannelState, ColorLayout};
pub use controller::{ControllerStatus, FrameStatus, StripController, StripSettings};
pub use engine::{RenderEngine, SimulatedEngine};
pub use error::{EngineError, StripError, StripResult};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// An RGBW color, decoupled from the packed form the engine consumes.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just four u8s).
/// `PartialEq, Eq` let tests compare colors directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),  // Red → Yellow
            1 => Self::new(falling, 255, 0), // Yellow → Green
            2 => Self::new(0, 255, rising),  // Green → Cyan
            3 => Self::new(0, falling, 255), // Cyan → Blue
            4 => Self::new(rising, 0, 255),  // Blue → Magenta
            _ => Self::new(255, 0, falling), // Magenta → Red
        }
    }

    /// Packed `0xWWRRGGBB`, the value `set_pixel` stores.
    ///
    /// Component order on the wire is the engine's business; the packed
    /// form is the same for every [`ColorLayout`].
    pub fn packed(self) -> u32 {
        u32::from_be_bytes([self.w, self.r, self.g, self.b])
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the main loop and the signal handler.
/// `AtomicBool` is a thread-safe boolean, so no mutex is needed.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn color_new_has_no_white() {
        let c = Color::new(10, 20, 30);
        assert_eq!((c.r, c.g, c.b, c.w), (10, 20, 30, 0));
    }

    #[rstest]
    #[case(0, 255, 0, 0)] // Red
    #[case(60, 255, 255, 0)] // Yellow
    #[case(120, 0, 255, 0)] // Green
    #[case(180, 0, 255, 255)] // Cyan
    #[case(240, 0, 0, 255)] // Blue
    #[case(300, 255, 0, 255)] // Magenta
    fn test_color_from_hue_primary(#[case] hue: u16, #[case] r: u8, #[case] g: u8, #[case] b: u8) {
        assert_eq!(Color::from_hue(hue), Color::new(r, g, b));
    }

    #[test]
    fn color_from_hue_wraps_at_360() {
        assert_eq!(Color::from_hue(0), Color::from_hue(360));
        assert_eq!(Color::from_hue(90), Color::from_hue(450));
    }

    #[rstest]
    #[case(Color::new(255, 0, 0), 0x00FF_0000)]
    #[case(Color::new(0, 255, 0), 0x0000_FF00)]
    #[case(Color::new(0, 0, 255), 0x0000_00FF)]
    #[case(Color { r: 1, g: 2, b: 3, w: 4 }, 0x0401_0203)]
    fn packed_is_wrgb(#[case] color: Color, #[case] packed: u32) {
        assert_eq!(color.packed(), packed);
    }

    #[test]
    fn is_running_reads_flag() {
        let flag = AtomicBool::new(true);
        assert!(is_running(&flag));
        flag.store(false, Ordering::SeqCst);
        assert!(!is_running(&flag));
    }
}
