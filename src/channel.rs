//! Channel descriptors: pin, pixel count, color layout, and the pixel
//! buffer lent by the render engine while the channel is active.
//!
//! ## Rust concepts
//! - `Option<Vec<u32>>` so "has a buffer" and "is active" cannot drift apart
//! - `#[repr(u8)]` enums for hardware codes
//! - `serde::Serialize` for the status snapshot

use serde::Serialize;

/// Number of independently addressable outputs.
pub const CHANNEL_COUNT: usize = 2;

/// Highest GPIO number the render engine accepts.
pub const MAX_PIN: u32 = 31;

/// Passed as pin or layout to mean "use the built-in default".
pub const DEFAULT_SENTINEL: u32 = 0xFF;

/// Pin substituted for [`DEFAULT_SENTINEL`].
pub const DEFAULT_PIN: u32 = 21;

// ── Color layout ─────────────────────────────────────────────────────

/// Component ordering of the strip, WS2811 (3 components) or SK6812 (4).
///
/// The discriminant is the layout code used by `configure_channel` and the
/// `chN:strip_type` config key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ColorLayout {
    #[default]
    Grb = 0x00,
    Gbr = 0x01,
    Rgb = 0x02,
    Rbg = 0x03,
    Brg = 0x04,
    Bgr = 0x05,
    Grbw = 0x06,
    Gbrw = 0x07,
    Rgbw = 0x08,
    Rbgw = 0x09,
    Brgw = 0x0A,
    Bgrw = 0x0B,
}

impl ColorLayout {
    pub const ALL: [ColorLayout; 12] = [
        Self::Grb,
        Self::Gbr,
        Self::Rgb,
        Self::Rbg,
        Self::Brg,
        Self::Bgr,
        Self::Grbw,
        Self::Gbrw,
        Self::Rgbw,
        Self::Rbgw,
        Self::Brgw,
        Self::Bgrw,
    ];

    /// Decode a layout code. Only the low nibble is significant; codes with
    /// no layout fall back to GRB with a warning.
    pub fn from_code(code: u32) -> Self {
        if code == DEFAULT_SENTINEL {
            return Self::default();
        }
        match Self::ALL.get((code & 0x0F) as usize) {
            Some(layout) => *layout,
            None => {
                tracing::warn!("unknown strip type {:#x}, using WS2811 GRB", code);
                Self::default()
            }
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// SK6812 layouts carry a dedicated white component.
    pub fn has_white(self) -> bool {
        self.code() >= Self::Grbw.code()
    }

    pub fn component_count(self) -> usize {
        if self.has_white() { 4 } else { 3 }
    }
}

// ── Channel configuration ────────────────────────────────────────────

/// Everything the render engine needs to know about one output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    pub pin: u32,
    pub pixel_count: u32,
    pub layout: ColorLayout,
    pub invert: bool,
    pub brightness: u8,
    pub white_shift: u8,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl ChannelConfig {
    /// Power-on configuration for `index`. Channel 0 sits on the default pin.
    pub fn for_index(index: usize) -> Self {
        Self {
            pin: if index == 0 { DEFAULT_PIN } else { 0 },
            ..Self::default()
        }
    }

    /// A channel with no pixels is not in use.
    pub fn in_use(&self) -> bool {
        self.pixel_count > 0
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            pin: 0,
            pixel_count: 0,
            layout: ColorLayout::default(),
            invert: false,
            brightness: 255,
            white_shift: 0,
            red_shift: 0,
            green_shift: 0,
            blue_shift: 0,
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// Lifecycle state of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Unconfigured,
    Configured,
    Active,
}

/// One output: its configuration plus the buffer it holds while active.
#[derive(Debug)]
pub struct Channel {
    pub(crate) config: ChannelConfig,
    configured: bool,
    buffer: Option<Vec<u32>>,
}

impl Channel {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            config: ChannelConfig::for_index(index),
            configured: false,
            buffer: None,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// `Active` exactly when a buffer is held.
    pub fn state(&self) -> ChannelState {
        if self.buffer.is_some() {
            ChannelState::Active
        } else if self.configured || self.config.in_use() {
            ChannelState::Configured
        } else {
            ChannelState::Unconfigured
        }
    }

    pub fn is_active(&self) -> bool {
        self.buffer.is_some()
    }

    /// Active with a buffer covering every configured pixel. A count raised
    /// after `begin` leaves the channel active but not ready until the next
    /// `begin`.
    pub fn is_ready(&self) -> bool {
        self.buffer
            .as_ref()
            .is_some_and(|buf| buf.len() >= self.config.pixel_count as usize)
    }

    /// Read-only view of the pixels, limited to `pixel_count`.
    pub fn pixels(&self) -> Option<&[u32]> {
        let count = self.config.pixel_count as usize;
        self.buffer.as_deref().map(|buf| &buf[..count.min(buf.len())])
    }

    pub(crate) fn reconfigure(&mut self, pin: u32, pixel_count: u32, layout: ColorLayout) {
        self.config.pin = pin;
        self.config.pixel_count = pixel_count;
        self.config.layout = layout;
        self.configured = true;
        self.buffer = None;
    }

    /// Take ownership of a buffer from the engine, zero-filled.
    pub(crate) fn activate(&mut self, mut buffer: Vec<u32>) {
        buffer.fill(0);
        self.buffer = Some(buffer);
    }

    pub(crate) fn deactivate(&mut self) {
        self.buffer = None;
    }

    /// Slot `led`, bounds-checked against `pixel_count` rather than the
    /// buffer capacity.
    pub(crate) fn slot_mut(&mut self, led: u32) -> Option<&mut u32> {
        if led >= self.config.pixel_count {
            return None;
        }
        self.buffer.as_mut()?.get_mut(led as usize)
    }

    pub(crate) fn buffer_mut(&mut self) -> Option<&mut Vec<u32>> {
        self.buffer.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0x00, ColorLayout::Grb)]
    #[case(0x02, ColorLayout::Rgb)]
    #[case(0x05, ColorLayout::Bgr)]
    #[case(0x08, ColorLayout::Rgbw)]
    #[case(0x0B, ColorLayout::Bgrw)]
    #[case(0x12, ColorLayout::Rgb)] // high nibble ignored
    #[case(0x0C, ColorLayout::Grb)] // no such layout
    #[case(0x0F, ColorLayout::Grb)]
    #[case(DEFAULT_SENTINEL, ColorLayout::Grb)]
    fn layout_from_code(#[case] code: u32, #[case] expected: ColorLayout) {
        assert_eq!(ColorLayout::from_code(code), expected);
    }

    #[test]
    fn layout_codes_match_table_position() {
        for (i, layout) in ColorLayout::ALL.iter().enumerate() {
            assert_eq!(layout.code() as usize, i);
            assert_eq!(ColorLayout::from_code(i as u32), *layout);
        }
    }

    #[rstest]
    #[case(ColorLayout::Grb, 3)]
    #[case(ColorLayout::Bgr, 3)]
    #[case(ColorLayout::Grbw, 4)]
    #[case(ColorLayout::Bgrw, 4)]
    fn component_count_follows_white(#[case] layout: ColorLayout, #[case] count: usize) {
        assert_eq!(layout.component_count(), count);
    }

    #[test]
    fn power_on_defaults() {
        let ch0 = ChannelConfig::for_index(0);
        assert_eq!(ch0.pin, DEFAULT_PIN);
        assert_eq!(ch0.pixel_count, 0);
        assert_eq!(ch0.brightness, 255);
        assert_eq!(ChannelConfig::for_index(1).pin, 0);
    }

    #[test]
    fn state_is_derived_from_buffer_and_configuration() {
        let mut ch = Channel::new(0);
        assert_eq!(ch.state(), ChannelState::Unconfigured);

        ch.reconfigure(18, 0, ColorLayout::Rgb);
        assert_eq!(ch.state(), ChannelState::Configured);

        ch.config.pixel_count = 4;
        ch.activate(vec![7; 4]);
        assert_eq!(ch.state(), ChannelState::Active);
        assert_eq!(ch.pixels(), Some(&[0, 0, 0, 0][..]));

        ch.deactivate();
        assert_eq!(ch.state(), ChannelState::Configured);
        assert!(ch.pixels().is_none());
    }

    #[test]
    fn count_alone_makes_a_channel_configured() {
        let mut ch = Channel::new(1);
        ch.config.pixel_count = 10;
        assert_eq!(ch.state(), ChannelState::Configured);
    }

    #[test]
    fn slot_is_bounded_by_pixel_count_not_capacity() {
        let mut ch = Channel::new(0);
        ch.reconfigure(18, 2, ColorLayout::Grb);
        ch.activate(vec![0; 8]);
        assert!(ch.slot_mut(1).is_some());
        assert!(ch.slot_mut(2).is_none());
        assert_eq!(ch.pixels().map(<[u32]>::len), Some(2));
    }

    #[test]
    fn ready_needs_a_buffer_covering_the_count() {
        let mut ch = Channel::new(0);
        ch.reconfigure(18, 3, ColorLayout::Grb);
        assert!(!ch.is_ready());
        ch.activate(vec![0; 3]);
        assert!(ch.is_ready());

        ch.config.pixel_count = 5;
        assert!(ch.is_active());
        assert!(!ch.is_ready());
    }

    #[test]
    fn reconfigure_drops_buffer() {
        let mut ch = Channel::new(0);
        ch.reconfigure(18, 2, ColorLayout::Grb);
        ch.activate(vec![0; 2]);
        ch.reconfigure(12, 5, ColorLayout::Rgbw);
        assert!(!ch.is_active());
        assert_eq!(ch.config().pin, 12);
        assert_eq!(ch.config().layout, ColorLayout::Rgbw);
    }
}
