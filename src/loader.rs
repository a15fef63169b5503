//! Configuration loader: turns `key=value` text into controller settings.
//!
//! Loading is best effort. A blank line, a comment, a line without `=`, an
//! unknown key or an out-of-range value is logged and skipped, and the
//! remaining lines still apply. A partial configuration must still be able
//! to start the strip, so nothing here returns an error.
//!
//! ```text
//! # /etc/stripleds.conf
//! autobegin=true
//! ch0:count=60      # leds on the first strip
//! ch0:gpionum=18
//! ch0:strip_type=0x02
//! ```
//!
//! ## Rust concepts
//! - Borrowed `&str` slices: parsing never allocates
//! - `IntoIterator<Item: AsRef<str>>` accepts `Vec<String>`, `&[&str]`, `str::lines()`,
//!   and [`load`] takes any sequence of those

use crate::controller::StripController;
use crate::engine::RenderEngine;
use crate::error::StripResult;
use crate::registry;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file consulted first.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/stripleds.conf";

/// Environment variable naming an optional override file.
pub const CONFIG_ENV_VAR: &str = "STRIPLEDS_CONF";

// ── Line parsing ─────────────────────────────────────────────────────

/// What a single line of configuration text means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Comment,
    /// No `=` or an empty key.
    Malformed,
    /// `key=default`: keep whatever the key currently holds.
    KeepDefault { key: &'a str },
    Assignment { key: &'a str, value: i64 },
}

pub fn parse_line(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with('#') {
        return Line::Comment;
    }
    let Some((key, value)) = line.split_once('=') else {
        return Line::Malformed;
    };
    let key = key.trim();
    if key.is_empty() {
        return Line::Malformed;
    }

    // Only the first token counts; anything after whitespace or `#` is ignored.
    let value = value.trim();
    let end = value
        .find(|c: char| c.is_whitespace() || c == '#')
        .unwrap_or(value.len());
    let value = &value[..end];

    if value.eq_ignore_ascii_case("default") {
        return Line::KeepDefault { key };
    }
    let value = parse_value(value).unwrap_or_else(|| {
        tracing::warn!("config: cannot parse value {:?} for {}, using 0", value, key);
        0
    });
    Line::Assignment { key, value }
}

fn parse_value(text: &str) -> Option<i64> {
    if text.eq_ignore_ascii_case("true") {
        Some(1)
    } else if text.eq_ignore_ascii_case("false") {
        Some(0)
    } else {
        parse_int(text)
    }
}

/// Parse the leading integer of `text`, C `strtol` style with base detection:
/// `0x`/`0X` hex, `0b`/`0B` binary, `0o`/`0O` or a bare leading `0` octal,
/// otherwise decimal. Trailing garbage is ignored; overflow saturates.
/// `None` when no digit could be read at all.
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let prefixed = |radix: u32| {
        rest.get(2..)
            .filter(|digits| digits.starts_with(|c: char| c.is_digit(radix)))
            .map(|digits| (radix, digits))
    };
    let prefix = match rest.as_bytes() {
        [b'0', marker, ..] => Some(marker.to_ascii_lowercase()),
        _ => None,
    };
    let (radix, digits) = match prefix {
        Some(b'x') => prefixed(16).unwrap_or((10, "0")),
        Some(b'b') => prefixed(2).unwrap_or((10, "0")),
        Some(b'o') => prefixed(8).unwrap_or((10, "0")),
        _ if rest.len() > 1 && rest.starts_with('0') => (8, rest),
        _ => (10, rest),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        seen = true;
        value = value
            .saturating_mul(i64::from(radix))
            .saturating_add(i64::from(digit));
    }
    seen.then_some(if negative { -value } else { value })
}

// ── Applying ─────────────────────────────────────────────────────────

/// Tally of what a load did, for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub applied: usize,
    pub kept_default: usize,
    pub unknown_keys: usize,
    pub out_of_range: usize,
    pub malformed: usize,
    /// Files that were found and read, in order.
    pub sources: Vec<PathBuf>,
    /// Result of the automatic `begin`, if `autobegin` was set.
    #[serde(skip)]
    pub autostart: Option<StripResult<()>>,
}

/// Load configuration from already-read line sources, in order, then
/// `begin` if `autobegin` ended up set. Later sources and later lines win.
///
/// This is the whole loading pipeline minus file access; the file loaders
/// read text and hand it here.
pub fn load<E, S>(strip: &mut StripController<E>, sources: S) -> LoadReport
where
    E: RenderEngine,
    S: IntoIterator,
    S::Item: IntoIterator,
    <S::Item as IntoIterator>::Item: AsRef<str>,
{
    let mut report = LoadReport::default();
    for lines in sources {
        apply_into(strip, lines, &mut report);
    }
    autostart(strip, &mut report);

    tracing::info!(
        "config loaded: {} applied, {} unknown, {} out of range",
        report.applied,
        report.unknown_keys,
        report.out_of_range
    );
    report
}

fn autostart<E: RenderEngine>(strip: &mut StripController<E>, report: &mut LoadReport) {
    if !strip.settings().autostart {
        return;
    }
    let result = strip.begin();
    if let Err(e) = &result {
        tracing::error!("autobegin failed: {}", e);
    }
    report.autostart = Some(result);
}

/// Apply configuration lines to `strip`, in order. Later lines win.
///
/// Settings only: `autobegin` is recorded but never acted on here. Use
/// [`load`] to get the automatic `begin`.
pub fn apply_lines<E, I>(strip: &mut StripController<E>, lines: I) -> LoadReport
where
    E: RenderEngine,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut report = LoadReport::default();
    apply_into(strip, lines, &mut report);
    report
}

fn apply_into<E, I>(strip: &mut StripController<E>, lines: I, report: &mut LoadReport)
where
    E: RenderEngine,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    for (number, raw) in lines.into_iter().enumerate() {
        let raw = raw.as_ref();
        match parse_line(raw) {
            Line::Blank | Line::Comment => {}
            Line::Malformed => {
                tracing::debug!("config line {}: skipped {:?}", number + 1, raw);
                report.malformed += 1;
            }
            Line::KeepDefault { key } => {
                tracing::debug!("config line {}: {} left at default", number + 1, key);
                report.kept_default += 1;
            }
            Line::Assignment { key, value } => {
                let Some(row) = registry::lookup(key) else {
                    tracing::warn!("config line {}: unknown key {:?}", number + 1, key);
                    report.unknown_keys += 1;
                    continue;
                };
                if !row.accepts(value) {
                    tracing::warn!(
                        "config line {}: {}={} out of range {}..={}, ignored",
                        number + 1,
                        key,
                        value,
                        row.min,
                        row.max
                    );
                    report.out_of_range += 1;
                    continue;
                }
                strip.apply_setting(row.setting, row.scope, value);
                report.applied += 1;
            }
        }
    }
}

/// The files to consult: the default path, then the file named by `env_var`
/// if that variable is set and non-empty.
pub fn config_sources(default_path: impl Into<PathBuf>, env_var: &str) -> Vec<PathBuf> {
    let mut sources = vec![default_path.into()];
    match std::env::var_os(env_var) {
        Some(path) if !path.is_empty() => sources.push(PathBuf::from(path)),
        _ => tracing::debug!("{} not set, no override config", env_var),
    }
    sources
}

/// Apply every readable file in `sources`, in order, then `begin` if
/// `autobegin` ended up set. Missing files are not an error.
pub fn load_sources<E: RenderEngine>(
    strip: &mut StripController<E>,
    sources: &[PathBuf],
) -> LoadReport {
    let texts: Vec<(&Path, String)> = sources
        .iter()
        .filter_map(|path| read_source(path).map(|text| (path.as_path(), text)))
        .collect();

    let mut report = load(strip, texts.iter().map(|(_, text)| text.lines()));
    report.sources = texts.iter().map(|(path, _)| path.to_path_buf()).collect();
    tracing::debug!("{} of {} config file(s) read", report.sources.len(), sources.len());
    report
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            tracing::info!("reading config {}", path.display());
            Some(text)
        }
        Err(e) => {
            tracing::debug!("config {} not read: {}", path.display(), e);
            None
        }
    }
}

/// Full startup: default file, environment override, optional autobegin.
pub fn startup<E: RenderEngine>(
    strip: &mut StripController<E>,
    default_path: impl Into<PathBuf>,
    env_var: &str,
) -> LoadReport {
    let sources = config_sources(default_path, env_var);
    load_sources(strip, &sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use crate::engine::SimulatedEngine;
    use crate::error::StripError;
    use crate::FrameStatus;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn controller() -> StripController<SimulatedEngine> {
        StripController::new(SimulatedEngine::new())
    }

    fn count(strip: &StripController<SimulatedEngine>, channel: usize) -> u32 {
        strip.channel(channel).unwrap().config().pixel_count
    }

    // ── parse_line ─────────────────────────────────────────────────

    #[rstest]
    #[case("", Line::Blank)]
    #[case("   \t ", Line::Blank)]
    #[case("# a comment", Line::Comment)]
    #[case("   # indented comment", Line::Comment)]
    #[case("no equals sign", Line::Malformed)]
    #[case("=5", Line::Malformed)]
    #[case("freq=800000", Line::Assignment { key: "freq", value: 800_000 })]
    #[case("  ch0:count = 100  ", Line::Assignment { key: "ch0:count", value: 100 })]
    #[case("ch0:count=100 # trailing", Line::Assignment { key: "ch0:count", value: 100 })]
    #[case("ch0:count=100#trailing", Line::Assignment { key: "ch0:count", value: 100 })]
    #[case("ch0:count=12 34", Line::Assignment { key: "ch0:count", value: 12 })]
    #[case("a=b=c", Line::Assignment { key: "a", value: 0 })]
    #[case("autobegin=true", Line::Assignment { key: "autobegin", value: 1 })]
    #[case("autobegin=FALSE", Line::Assignment { key: "autobegin", value: 0 })]
    #[case("ch1:invert=True", Line::Assignment { key: "ch1:invert", value: 1 })]
    #[case("ch0:count=default", Line::KeepDefault { key: "ch0:count" })]
    #[case("ch0:count=Default", Line::KeepDefault { key: "ch0:count" })]
    #[case("ch0:count=DEFAULT # keep", Line::KeepDefault { key: "ch0:count" })]
    #[case("ch0:count=", Line::Assignment { key: "ch0:count", value: 0 })]
    fn parse_lines(#[case] raw: &str, #[case] expected: Line<'static>) {
        assert_eq!(parse_line(raw), expected);
    }

    #[rstest]
    #[case("0", Some(0))]
    #[case("42", Some(42))]
    #[case("-5", Some(-5))]
    #[case("+7", Some(7))]
    #[case("0x1F", Some(31))]
    #[case("0XfF", Some(255))]
    #[case("0b101", Some(5))]
    #[case("0o17", Some(15))]
    #[case("017", Some(15))]
    #[case("09", Some(0))]
    #[case("0x", Some(0))]
    #[case("0xZZ", Some(0))]
    #[case("12abc", Some(12))]
    #[case("-0x10", Some(-16))]
    #[case("abc", None)]
    #[case("", None)]
    #[case("-", None)]
    #[case("99999999999999999999999", Some(i64::MAX))]
    fn parse_int_detects_base(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(text), expected);
    }

    // ── apply_lines ────────────────────────────────────────────────

    #[test]
    fn count_then_default_keeps_value() {
        let mut strip = controller();
        apply_lines(&mut strip, ["ch0:count=100", "ch0:count=default"]);
        assert_eq!(count(&strip, 0), 100);
    }

    #[rstest]
    #[case("ch0:count=-5")]
    #[case("ch0:count=0x10000")]
    #[case("ch0:gpionum=32")]
    #[case("freq=1000000")]
    fn out_of_range_is_rejected(#[case] line: &str) {
        let mut strip = controller();
        apply_lines(&mut strip, ["ch0:count=100", "ch0:gpionum=18", "freq=800000"]);
        let before = strip.status();

        let report = apply_lines(&mut strip, [line]);
        assert_eq!(report.out_of_range, 1);
        assert_eq!(report.applied, 0);
        let after = strip.status();
        assert_eq!(after.channels[0].config, before.channels[0].config);
        assert_eq!(after.settings, before.settings);
    }

    #[test]
    fn bad_lines_do_not_stop_the_load() {
        let mut strip = controller();
        let report = apply_lines(
            &mut strip,
            [
                "# header",
                "garbage line",
                "ch7:count=3",
                "ch0:count=99999999",
                "",
                "ch1:count=8",
                "ch1:brightness=0x40",
            ],
        );
        assert_eq!(count(&strip, 1), 8);
        assert_eq!(strip.channel(1).unwrap().config().brightness, 0x40);
        assert_eq!(
            report,
            LoadReport {
                applied: 2,
                unknown_keys: 1,
                out_of_range: 1,
                malformed: 1,
                ..LoadReport::default()
            }
        );
    }

    #[test]
    fn every_key_is_applied() {
        let mut strip = controller();
        let lines = "\
            autobegin=1\n\
            verbosity=2\n\
            dmanum=5\n\
            freq=400000\n\
            render_wait_time=1\n\
            ch1:gpionum=13\n\
            ch1:count=7\n\
            ch1:strip_type=8\n\
            ch1:invert=true\n\
            ch1:brightness=128\n\
            ch1:wshift=24\n\
            ch1:rshift=16\n\
            ch1:gshift=8\n\
            ch1:bshift=0\n";
        let report = apply_lines(&mut strip, lines.lines());
        assert_eq!(report.applied, 14);

        let settings = strip.settings();
        assert!(settings.autostart);
        assert_eq!(settings.verbosity, 2);
        assert_eq!(settings.dma_channel, 5);
        assert_eq!(settings.frequency, 400_000);
        assert_eq!(settings.render_wait_time, 1);

        let ch1 = strip.channel(1).unwrap().config();
        assert_eq!(ch1.pin, 13);
        assert_eq!(ch1.pixel_count, 7);
        assert_eq!(ch1.layout, crate::ColorLayout::Rgbw);
        assert!(ch1.invert);
        assert_eq!(ch1.brightness, 128);
        assert_eq!(
            (ch1.white_shift, ch1.red_shift, ch1.green_shift, ch1.blue_shift),
            (24, 16, 8, 0)
        );
    }

    #[test]
    fn apply_lines_never_begins() {
        let mut strip = controller();
        apply_lines(&mut strip, ["autobegin=true", "ch0:count=3"]);
        assert!(strip.settings().autostart);
        assert!(!strip.is_running());
    }

    #[test]
    fn load_autobegins_from_line_sources() {
        let mut strip = controller();
        let report = load(&mut strip, [["autobegin=true", "ch0:count=3"]]);
        assert_eq!(report.autostart, Some(Ok(())));
        assert!(strip.is_running());
        assert_eq!(strip.channel(0).unwrap().state(), ChannelState::Active);
        assert!(report.sources.is_empty());
    }

    #[test]
    fn load_applies_sources_in_order_before_starting() {
        let mut strip = controller();
        let base = vec!["autobegin=1".to_string(), "ch0:count=10".to_string()];
        let over = vec!["ch0:count=4".to_string()];
        let report = load(&mut strip, [base, over]);
        assert_eq!(report.applied, 3);
        assert_eq!(report.autostart, Some(Ok(())));
        assert_eq!(strip.engine().last_config().unwrap().channels[0].pixel_count, 4);
    }

    #[test]
    fn load_without_autobegin_leaves_strip_idle() {
        let mut strip = controller();
        let report = load(&mut strip, [["ch0:count=3"]]);
        assert!(report.autostart.is_none());
        assert!(!strip.is_running());
    }

    // ── files and startup ──────────────────────────────────────────

    fn write_config(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn later_sources_override_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.conf", "ch0:count=10\nch0:gpionum=18\n");
        let over = write_config(&tmp, "override.conf", "ch0:count=20\n");

        let mut strip = controller();
        let report = load_sources(&mut strip, &[base.clone(), over.clone()]);
        assert_eq!(count(&strip, 0), 20);
        assert_eq!(strip.channel(0).unwrap().config().pin, 18);
        assert_eq!(report.sources, vec![base, over]);
        assert!(report.autostart.is_none());
    }

    #[test]
    fn missing_sources_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let present = write_config(&tmp, "present.conf", "ch1:count=4\n");
        let missing = tmp.path().join("missing.conf");

        let mut strip = controller();
        let report = load_sources(&mut strip, &[missing, present.clone()]);
        assert_eq!(count(&strip, 1), 4);
        assert_eq!(report.sources, vec![present]);
    }

    #[test]
    fn autobegin_starts_after_all_sources() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.conf", "autobegin=true\n");
        let over = write_config(&tmp, "override.conf", "ch0:count=3\n");

        let mut strip = controller();
        let report = load_sources(&mut strip, &[base, over]);
        assert_eq!(report.autostart, Some(Ok(())));
        assert_eq!(strip.channel(0).unwrap().state(), ChannelState::Active);
        assert_eq!(strip.engine().starts(), 1);
    }

    #[test]
    fn failed_autobegin_is_reported() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.conf", "autobegin=true\n");

        let mut strip = controller();
        let report = load_sources(&mut strip, &[base]);
        assert!(matches!(report.autostart, Some(Err(StripError::InitFailed(_)))));
        assert!(!strip.is_running());
    }

    #[test]
    fn config_sources_without_env_is_default_only() {
        let sources = config_sources("/etc/stripleds.conf", "STRIPLEDS_TEST_NEVER_SET_7F3A");
        assert_eq!(sources, vec![PathBuf::from("/etc/stripleds.conf")]);
    }

    #[test]
    fn startup_with_nothing_to_read_is_harmless() {
        let tmp = TempDir::new().unwrap();
        let mut strip = controller();
        let report = startup(
            &mut strip,
            tmp.path().join("absent.conf"),
            "STRIPLEDS_TEST_NEVER_SET_7F3A",
        );
        assert!(report.sources.is_empty());
        assert_eq!(report.applied, 0);
        assert!(!strip.is_running());
    }

    #[test]
    fn end_to_end_scenario() {
        let mut strip = controller();
        let report = load(
            &mut strip,
            [["autobegin=true", "ch0:count=3", "ch0:gpionum=18"]],
        );
        assert_eq!(report.autostart, Some(Ok(())));

        strip.set_pixel(0, 0xFF0000, 0).unwrap();
        assert_eq!(
            strip.set_pixel(3, 0x000000, 0),
            Err(StripError::BadParam { led: 3, count: 3 })
        );
        assert_eq!(strip.render(), Ok(FrameStatus::Sent));
        assert_eq!(strip.engine().last_frame(0), Some(&[0xFF0000, 0, 0][..]));

        strip.end();
        let channel = strip.channel(0).unwrap();
        assert_eq!(channel.config().pixel_count, 3);
        assert_eq!(channel.config().pin, 18);
        assert_ne!(channel.state(), ChannelState::Active);
    }
}
