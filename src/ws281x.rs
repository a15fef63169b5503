//! Raspberry Pi render engine built on `rs_ws281x` (PWM/PCM + DMA).
//!
//! Only compiled with the `hardware` feature. Requires root (or
//! `/dev/mem` access) at runtime.

use crate::channel::{ChannelConfig, ColorLayout};
use crate::engine::{Allocation, EngineConfig, Frame, RenderEngine};
use crate::error::EngineError;
use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder, StripType};

/// Convert our layout to the driver's strip type at the boundary.
fn strip_type(layout: ColorLayout) -> StripType {
    match layout {
        ColorLayout::Grb => StripType::Ws2811Grb,
        ColorLayout::Gbr => StripType::Ws2811Gbr,
        ColorLayout::Rgb => StripType::Ws2811Rgb,
        ColorLayout::Rbg => StripType::Ws2811Rbg,
        ColorLayout::Brg => StripType::Ws2811Brg,
        ColorLayout::Bgr => StripType::Ws2811Bgr,
        ColorLayout::Grbw => StripType::Sk6812Grbw,
        ColorLayout::Gbrw => StripType::Sk6812Gbrw,
        ColorLayout::Rgbw => StripType::Sk6812Rgbw,
        ColorLayout::Rbgw => StripType::Sk6812Rbgw,
        ColorLayout::Brgw => StripType::Sk6812Brgw,
        ColorLayout::Bgrw => StripType::Sk6812Bgrw,
    }
}

fn channel(config: &ChannelConfig) -> rs_ws281x::Channel {
    ChannelBuilder::new()
        .pin(config.pin as i32)
        .count(config.pixel_count as i32)
        .strip_type(strip_type(config.layout))
        .invert(config.invert)
        .brightness(config.brightness)
        .build()
}

/// Engine owning the `rs_ws281x` controller while started.
#[derive(Default)]
pub struct Ws281xEngine {
    controller: Option<Controller>,
    wait_after_render: bool,
}

impl Ws281xEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderEngine for Ws281xEngine {
    fn start(&mut self, config: &EngineConfig) -> Result<Allocation, EngineError> {
        if self.controller.is_some() {
            return Err(EngineError::Start("driver already initialised".to_string()));
        }
        for (index, ch) in config.channels.iter().enumerate() {
            if ch.white_shift | ch.red_shift | ch.green_shift | ch.blue_shift != 0 {
                tracing::warn!("channel {}: custom component shifts not supported by driver", index);
            }
        }

        let controller = ControllerBuilder::new()
            .freq(config.frequency)
            .dma(i32::from(config.dma_channel))
            .channel(0, channel(&config.channels[0]))
            .channel(1, channel(&config.channels[1]))
            .build()
            .map_err(|e| EngineError::Start(format!("{e:?}")))?;

        let mut allocation: Allocation = Default::default();
        for (index, ch) in config.channels.iter().enumerate() {
            if ch.in_use() {
                allocation[index] = Some(vec![0; controller.leds(index).len()]);
            }
        }

        self.wait_after_render = config.render_wait_time != 0;
        self.controller = Some(controller);
        tracing::info!(
            "ws281x driver started: {} Hz, dma {}",
            config.frequency,
            config.dma_channel
        );
        Ok(allocation)
    }

    fn render(&mut self, frame: Frame<'_>) -> Result<(), EngineError> {
        let controller = self
            .controller
            .as_mut()
            .ok_or_else(|| EngineError::Render("driver not initialised".to_string()))?;

        for (index, pixels) in frame.iter().enumerate() {
            let Some(pixels) = pixels else { continue };
            // RawColor is the little-endian byte view of 0xWWRRGGBB.
            for (led, value) in controller.leds_mut(index).iter_mut().zip(pixels.iter()) {
                *led = value.to_le_bytes();
            }
        }

        controller
            .render()
            .map_err(|e| EngineError::Render(format!("{e:?}")))?;
        if self.wait_after_render {
            controller
                .wait()
                .map_err(|e| EngineError::Render(format!("{e:?}")))?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the controller calls ws2811_fini.
        if self.controller.take().is_some() {
            tracing::info!("ws281x driver stopped");
        }
    }
}
