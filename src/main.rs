//! Strip LED daemon
//!
//! Loads the strip configuration, starts the strips and plays a simple
//! animation until Ctrl+C, then releases the hardware.
//!
//! Built with the `hardware` feature it drives real strips through the
//! Raspberry Pi DMA engine; without it, frames go to an in-memory engine
//! so the configuration can be checked on any machine.
//!
//! ## Usage
//! ```sh
//! cargo build --release --features hardware
//! sudo ./target/release/strip-leds --pattern rainbow --fps 60
//! STRIPLEDS_CONF=./my.conf ./target/release/strip-leds --print-status
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use strip_leds::loader::{self, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use strip_leds::{
    CHANNEL_COUNT, Color, FrameStatus, RenderEngine, StripController, is_running,
    setup_signal_handler,
};
use tracing_subscriber::EnvFilter;

/// Animation played while running.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Pattern {
    /// A single lit pixel walking along each strip
    Chase,
    /// A rotating rainbow
    Rainbow,
    /// Every pixel the same color
    Solid,
}

/// Two-channel WS281x/SK6812 strip driver
#[derive(Parser, Debug)]
#[command(name = "strip-leds")]
#[command(version)]
struct Args {
    /// Default configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Environment variable naming an override configuration file
    #[arg(long, default_value = CONFIG_ENV_VAR)]
    config_env: String,

    /// Animation to play
    #[arg(long, value_enum, default_value_t = Pattern::Chase)]
    pattern: Pattern,

    /// Frames per second
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Color for the solid and chase patterns, as 0xRRGGBB
    #[arg(long, default_value = "0xFF0000", value_parser = parse_color)]
    color: u32,

    /// Print the loaded configuration as JSON and exit
    #[arg(long)]
    print_status: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_color(text: &str) -> Result<u32, String> {
    loader::parse_int(text)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| format!("not a color: {text}"))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    tracing::info!("strip-leds v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(feature = "hardware")]
    let engine = strip_leds::ws281x::Ws281xEngine::new();
    #[cfg(not(feature = "hardware"))]
    let engine = {
        tracing::warn!("built without the 'hardware' feature, frames stay in memory");
        strip_leds::SimulatedEngine::new()
    };

    run(args, engine)
}

fn run<E: RenderEngine>(args: Args, engine: E) -> ExitCode {
    let mut strip = StripController::new(engine);
    let report = loader::startup(&mut strip, args.config.clone(), &args.config_env);

    if args.print_status {
        match serde_json::to_string_pretty(&strip.status()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("cannot serialize status: {}", e);
                return ExitCode::FAILURE;
            }
        }
        strip.end();
        return ExitCode::SUCCESS;
    }

    if report.autostart.is_none() {
        if let Err(e) = strip.begin() {
            tracing::error!("cannot start strips: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if !strip.is_running() {
        return ExitCode::FAILURE;
    }

    let running = setup_signal_handler();
    let frame_duration = Duration::from_millis(1000 / args.fps.max(1) as u64);
    let mut frame: u32 = 0;
    let mut dropped: u64 = 0;

    while is_running(&running) {
        draw(&mut strip, args.pattern, args.color, frame);
        match strip.render() {
            Ok(FrameStatus::Sent) => {}
            Ok(FrameStatus::Dropped { .. }) => dropped += 1,
            Err(e) => {
                tracing::error!("render refused: {}", e);
                break;
            }
        }
        frame = frame.wrapping_add(1);
        thread::sleep(frame_duration);
    }

    strip.clear();
    if let Err(e) = strip.render() {
        tracing::debug!("final blank frame not sent: {}", e);
    }
    strip.end();
    tracing::info!("shut down after {} frames ({} dropped)", frame, dropped);
    ExitCode::SUCCESS
}

fn draw<E: RenderEngine>(strip: &mut StripController<E>, pattern: Pattern, color: u32, frame: u32) {
    for index in 0..CHANNEL_COUNT {
        let count = match strip.channel(index) {
            Some(channel) if channel.is_active() => channel.config().pixel_count,
            _ => continue,
        };
        for led in 0..count {
            let value = match pattern {
                Pattern::Solid => color,
                Pattern::Chase if led == frame % count => color,
                Pattern::Chase => 0,
                Pattern::Rainbow => {
                    let hue = (led * 360 / count).wrapping_add(frame.wrapping_mul(4)) % 360;
                    Color::from_hue(hue as u16).packed()
                }
            };
            if let Err(e) = strip.set_pixel(led, value, index) {
                tracing::warn!("set led {} on channel {}: {}", led, index, e);
            }
        }
    }
}
