//! Strip controller: owns both channels and the global render parameters,
//! and enforces the channel lifecycle.
//!
//! ```text
//! Unconfigured ──configure──▶ Configured ──begin──▶ Active
//!                                  ▲                   │
//!                                  └──────── end ──────┘
//! ```
//!
//! ## Rust concepts
//! - Generic over a trait (`E: RenderEngine`) instead of a global handle
//! - `&mut self` on every mutating operation: the borrow checker is the lock.
//!   Share across threads with `Arc<Mutex<StripController<E>>>`.
//! - One `match` on [`Setting`] routes every registry row to its field

use crate::channel::{
    CHANNEL_COUNT, Channel, ChannelConfig, ChannelState, ColorLayout, DEFAULT_PIN,
    DEFAULT_SENTINEL, MAX_PIN,
};
use crate::engine::{Allocation, EngineConfig, Frame, RenderEngine};
use crate::error::{StripError, StripResult};
use crate::registry::{Scope, Setting};
use serde::Serialize;

// ── Global settings ──────────────────────────────────────────────────

/// Parameters shared by both channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StripSettings {
    pub frequency: u32,
    pub dma_channel: u8,
    pub render_wait_time: u8,
    pub verbosity: u8,
    pub autostart: bool,
}

impl Default for StripSettings {
    fn default() -> Self {
        Self {
            frequency: 800_000,
            dma_channel: 10,
            render_wait_time: 0,
            verbosity: 0,
            autostart: false,
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Outcome of a frame transmission that passed the readiness checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Sent,
    /// The engine rejected the frame. Controller state is unchanged.
    Dropped { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub index: usize,
    pub state: ChannelState,
    #[serde(flatten)]
    pub config: ChannelConfig,
}

/// Serializable snapshot of the whole controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub settings: StripSettings,
    pub engine_running: bool,
    pub channels: Vec<ChannelStatus>,
}

// ── Controller ───────────────────────────────────────────────────────

pub struct StripController<E> {
    settings: StripSettings,
    channels: [Channel; CHANNEL_COUNT],
    engine: E,
    engine_running: bool,
}

impl<E: RenderEngine> StripController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            settings: StripSettings::default(),
            channels: [Channel::new(0), Channel::new(1)],
            engine,
            engine_running: false,
        }
    }

    pub fn settings(&self) -> &StripSettings {
        &self.settings
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_running(&self) -> bool {
        self.engine_running
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            settings: self.settings,
            engine_running: self.engine_running,
            channels: self
                .channels
                .iter()
                .enumerate()
                .map(|(index, channel)| ChannelStatus {
                    index,
                    state: channel.state(),
                    config: *channel.config(),
                })
                .collect(),
        }
    }

    /// Set pin, pixel count and layout of one channel.
    ///
    /// [`DEFAULT_SENTINEL`] as `pin` or `layout` selects the built-in
    /// default. Validation happens before anything is written, so a failed
    /// call leaves the channel untouched. Reconfiguring an active channel
    /// drops its buffer; the engine itself is only released by [`end`](Self::end).
    pub fn configure_channel(
        &mut self,
        pixel_count: u32,
        pin: u32,
        layout: u32,
        channel: usize,
    ) -> StripResult<()> {
        tracing::debug!(
            "configure channel {}: pin={}, count={}, layout={:#x}",
            channel,
            pin,
            pixel_count,
            layout
        );
        if channel >= CHANNEL_COUNT {
            tracing::error!("configure failed: unsupported channel number {}", channel);
            return Err(StripError::ChannelRange(channel));
        }
        let pin = if pin == DEFAULT_SENTINEL { DEFAULT_PIN } else { pin };
        if pin > MAX_PIN {
            tracing::error!("configure failed: unsupported pin {}", pin);
            return Err(StripError::BadPin(pin));
        }
        let layout = ColorLayout::from_code(layout);
        self.channels[channel].reconfigure(pin, pixel_count, layout);
        Ok(())
    }

    /// Write an already range-checked value into the field `setting` targets.
    ///
    /// Per-channel settings need a channel scope; a global scope or an
    /// out-of-range channel is logged and ignored. Never changes channel state.
    pub fn apply_setting(&mut self, setting: Setting, scope: Scope, value: i64) {
        tracing::debug!("apply {:?} (scope {}) = {}", setting, scope.code(), value);

        match setting {
            Setting::AutoBegin => self.settings.autostart = value != 0,
            Setting::Verbosity => self.settings.verbosity = clamp_u8(value),
            Setting::DmaNum => self.settings.dma_channel = clamp_u8(value),
            Setting::Frequency => self.settings.frequency = value.clamp(0, u32::MAX.into()) as u32,
            Setting::RenderWaitTime => self.settings.render_wait_time = clamp_u8(value),
            Setting::GpioNum => {
                self.with_channel(setting, scope, |c| c.pin = value.clamp(0, MAX_PIN.into()) as u32)
            }
            Setting::Count => self.with_channel(setting, scope, |c| {
                c.pixel_count = value.clamp(0, u32::MAX.into()) as u32
            }),
            Setting::StripType => self.with_channel(setting, scope, |c| {
                c.layout = ColorLayout::from_code(value.max(0) as u32)
            }),
            Setting::Invert => self.with_channel(setting, scope, |c| c.invert = value != 0),
            Setting::Brightness => {
                self.with_channel(setting, scope, |c| c.brightness = clamp_u8(value))
            }
            Setting::WhiteShift => {
                self.with_channel(setting, scope, |c| c.white_shift = clamp_u8(value))
            }
            Setting::RedShift => self.with_channel(setting, scope, |c| c.red_shift = clamp_u8(value)),
            Setting::GreenShift => {
                self.with_channel(setting, scope, |c| c.green_shift = clamp_u8(value))
            }
            Setting::BlueShift => {
                self.with_channel(setting, scope, |c| c.blue_shift = clamp_u8(value))
            }
        }
    }

    /// Run `write` on the configuration `scope` names, or log and skip when
    /// the scope is global or past the last channel.
    fn with_channel(
        &mut self,
        setting: Setting,
        scope: Scope,
        write: impl FnOnce(&mut ChannelConfig),
    ) {
        let Scope::Channel(index) = scope else {
            tracing::warn!("setting {:?} needs a channel scope, ignored", setting);
            return;
        };
        match self.channels.get_mut(index) {
            Some(channel) => write(&mut channel.config),
            None => tracing::warn!("setting {:?} for unknown channel {}, ignored", setting, index),
        }
    }

    /// Raw-id entry point: resolves `setting_id` and `scope` codes, logging
    /// and ignoring ids no setting uses.
    pub fn apply_setting_id(&mut self, setting_id: u8, scope: i8, value: i64) {
        let Some(setting) = Setting::from_id(setting_id) else {
            tracing::warn!("unknown setting id {}, ignored", setting_id);
            return;
        };
        let scope = match usize::try_from(scope) {
            Ok(index) => Scope::Channel(index),
            Err(_) => Scope::Global,
        };
        self.apply_setting(setting, scope, value);
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            frequency: self.settings.frequency,
            dma_channel: self.settings.dma_channel,
            render_wait_time: self.settings.render_wait_time,
            channels: [self.channels[0].config, self.channels[1].config],
        }
    }

    /// Start the engine and activate every channel in use.
    ///
    /// All-or-nothing: if the engine fails to start, or fails to hand out a
    /// big enough buffer for any channel in use, the engine is released and
    /// no channel becomes active. Calling `begin` while a channel is active
    /// does nothing and succeeds.
    pub fn begin(&mut self) -> StripResult<()> {
        if self.channels.iter().any(Channel::is_active) {
            tracing::debug!("begin: already active");
            return Ok(());
        }
        if !self.channels.iter().any(|c| c.config.in_use()) {
            tracing::error!("begin failed: no channel has any leds");
            return Err(StripError::init_failed("nothing configured"));
        }
        if self.engine_running {
            // Channels were reconfigured under a running engine.
            self.engine.stop();
            self.engine_running = false;
        }

        let config = self.engine_config();
        let mut allocation = match self.engine.start(&config) {
            Ok(allocation) => allocation,
            Err(e) => {
                tracing::error!("begin failed: {}", e);
                return Err(StripError::init_failed(e.to_string()));
            }
        };

        if let Err(e) = check_allocation(&config, &allocation) {
            self.engine.stop();
            return Err(e);
        }

        for (channel, buffer) in self.channels.iter_mut().zip(allocation.iter_mut()) {
            if channel.config.in_use() {
                if let Some(buffer) = buffer.take() {
                    channel.activate(buffer);
                }
            }
        }
        self.engine_running = true;
        tracing::info!(
            "strip ready: ch0={} leds on gpio {}, ch1={} leds on gpio {}",
            config.channels[0].pixel_count,
            config.channels[0].pin,
            config.channels[1].pixel_count,
            config.channels[1].pin
        );
        Ok(())
    }

    /// Store a packed color in slot `led` of `channel`.
    pub fn set_pixel(&mut self, led: u32, color: u32, channel: usize) -> StripResult<()> {
        tracing::trace!("set led {} = {:#08x} on channel {}", led, color, channel);
        let channel = self.ready_channel_mut(channel)?;
        let count = channel.config.pixel_count;
        if led >= count {
            tracing::debug!("led {} not in range ({} leds)", led, count);
            return Err(StripError::BadParam { led, count });
        }
        if !channel.is_ready() {
            return Err(StripError::NotInitialized);
        }
        let slot = channel.slot_mut(led).ok_or(StripError::NotInitialized)?;
        *slot = color;
        Ok(())
    }

    /// Read slot `led` of `channel`, with the same checks as [`set_pixel`](Self::set_pixel).
    pub fn pixel(&self, led: u32, channel: usize) -> StripResult<u32> {
        let channel = self
            .channels
            .get(channel)
            .filter(|c| c.is_active())
            .ok_or(StripError::NotInitialized)?;
        let count = channel.config.pixel_count;
        if led >= count {
            return Err(StripError::BadParam { led, count });
        }
        if !channel.is_ready() {
            return Err(StripError::NotInitialized);
        }
        channel
            .pixels()
            .and_then(|pixels| pixels.get(led as usize).copied())
            .ok_or(StripError::NotInitialized)
    }

    /// Zero every active buffer. Takes effect on the next render.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            if let Some(buffer) = channel.buffer_mut() {
                buffer.fill(0);
            }
        }
    }

    fn ready_channel_mut(&mut self, channel: usize) -> StripResult<&mut Channel> {
        match self.channels.get_mut(channel) {
            Some(c) if c.is_active() => {
                if !c.is_ready() {
                    tracing::warn!("channel {} has more leds than its buffer, begin again", channel);
                }
                Ok(c)
            }
            _ => {
                tracing::debug!("channel {} not ready", channel);
                Err(StripError::NotInitialized)
            }
        }
    }

    /// Transmit the current buffers of both channels as one frame.
    ///
    /// Every channel in use must be ready: active, with a buffer covering
    /// its pixel count. Engine failures are logged and reported as
    /// [`FrameStatus::Dropped`]; they are not retried.
    pub fn render(&mut self) -> StripResult<FrameStatus> {
        let blocked = self
            .channels
            .iter()
            .any(|c| c.config.in_use() && !c.is_ready());
        if !self.engine_running || blocked {
            tracing::debug!("render: strip not ready");
            return Err(StripError::NotInitialized);
        }

        let frame: Frame<'_> = [self.channels[0].pixels(), self.channels[1].pixels()];
        match self.engine.render(frame) {
            Ok(()) => Ok(FrameStatus::Sent),
            Err(e) => {
                tracing::error!("render failed: {}", e);
                Ok(FrameStatus::Dropped {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Release the engine and deactivate every channel. Configuration is
    /// kept, so a later `begin` brings the same setup back. Never fails.
    pub fn end(&mut self) {
        if self.engine_running {
            self.engine.stop();
            self.engine_running = false;
            tracing::info!("strip stopped");
        }
        for channel in &mut self.channels {
            channel.deactivate();
        }
    }
}

fn check_allocation(config: &EngineConfig, allocation: &Allocation) -> StripResult<()> {
    for (index, (channel, buffer)) in config.channels.iter().zip(allocation).enumerate() {
        if !channel.in_use() {
            continue;
        }
        match buffer {
            None => {
                tracing::error!("begin failed: no buffer for channel {}", index);
                return Err(StripError::init_failed(format!(
                    "no buffer allocated for channel {index}"
                )));
            }
            Some(buf) if buf.len() < channel.pixel_count as usize => {
                tracing::error!(
                    "begin failed: channel {} got {} slots for {} leds",
                    index,
                    buf.len(),
                    channel.pixel_count
                );
                return Err(StripError::init_failed(format!(
                    "short buffer for channel {index}"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, u8::MAX.into()) as u8
}
