//! Configuration key registry: the fixed vocabulary of `key=value` settings.
//!
//! Each row names a key, the field it targets, which channel (if any) it
//! is scoped to, and the inclusive range of accepted values. The table is
//! data; [`StripController::apply_setting`](crate::StripController::apply_setting)
//! is the single function that writes a validated value into its field.

use std::ops::RangeInclusive;

/// Target field of a setting. The discriminant is the numeric setting id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Setting {
    AutoBegin = 1,
    Verbosity = 2,
    DmaNum = 3,
    Frequency = 4,
    RenderWaitTime = 5,
    GpioNum = 10,
    Count = 11,
    StripType = 12,
    Invert = 13,
    Brightness = 14,
    WhiteShift = 15,
    RedShift = 16,
    GreenShift = 17,
    BlueShift = 18,
}

impl Setting {
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Setting::id`]; `None` for ids no setting uses.
    pub fn from_id(id: u8) -> Option<Self> {
        SETTINGS
            .iter()
            .map(|row| row.setting)
            .find(|setting| setting.id() == id)
    }

    /// Per-channel settings target a channel descriptor, the rest the controller.
    pub fn is_per_channel(self) -> bool {
        self.id() >= Self::GpioNum.id()
    }
}

/// Which part of the controller a setting addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Channel(usize),
}

impl Scope {
    /// Raw scope code: -1 for global, otherwise the channel index.
    pub fn code(self) -> i8 {
        match self {
            Self::Global => -1,
            Self::Channel(index) => index as i8,
        }
    }
}

/// One row of the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigSetting {
    pub name: &'static str,
    pub setting: Setting,
    pub scope: Scope,
    pub min: i64,
    pub max: i64,
}

impl ConfigSetting {
    pub fn range(&self) -> RangeInclusive<i64> {
        self.min..=self.max
    }

    pub fn accepts(&self, value: i64) -> bool {
        self.range().contains(&value)
    }
}

const fn global(name: &'static str, setting: Setting, min: i64, max: i64) -> ConfigSetting {
    ConfigSetting {
        name,
        setting,
        scope: Scope::Global,
        min,
        max,
    }
}

const fn channel(
    name: &'static str,
    index: usize,
    setting: Setting,
    min: i64,
    max: i64,
) -> ConfigSetting {
    ConfigSetting {
        name,
        setting,
        scope: Scope::Channel(index),
        min,
        max,
    }
}

const MAX_COUNT: i64 = 0xFFFF;

/// Every key the loader understands. Order is presentation only.
pub static SETTINGS: &[ConfigSetting] = &[
    global("autobegin", Setting::AutoBegin, 0, 1),
    global("verbosity", Setting::Verbosity, 0, 3),
    global("dmanum", Setting::DmaNum, 0, 14),
    global("freq", Setting::Frequency, 400_000, 800_000),
    global("render_wait_time", Setting::RenderWaitTime, 0, 1),
    channel("ch0:gpionum", 0, Setting::GpioNum, 0, 31),
    channel("ch0:count", 0, Setting::Count, 0, MAX_COUNT),
    channel("ch0:strip_type", 0, Setting::StripType, 0, 11),
    channel("ch0:invert", 0, Setting::Invert, 0, 1),
    channel("ch0:brightness", 0, Setting::Brightness, 0, 255),
    channel("ch0:wshift", 0, Setting::WhiteShift, 0, 255),
    channel("ch0:rshift", 0, Setting::RedShift, 0, 255),
    channel("ch0:gshift", 0, Setting::GreenShift, 0, 255),
    channel("ch0:bshift", 0, Setting::BlueShift, 0, 255),
    channel("ch1:gpionum", 1, Setting::GpioNum, 0, 31),
    channel("ch1:count", 1, Setting::Count, 0, MAX_COUNT),
    channel("ch1:strip_type", 1, Setting::StripType, 0, 11),
    channel("ch1:invert", 1, Setting::Invert, 0, 1),
    channel("ch1:brightness", 1, Setting::Brightness, 0, 255),
    channel("ch1:wshift", 1, Setting::WhiteShift, 0, 255),
    channel("ch1:rshift", 1, Setting::RedShift, 0, 255),
    channel("ch1:gshift", 1, Setting::GreenShift, 0, 255),
    channel("ch1:bshift", 1, Setting::BlueShift, 0, 255),
];

/// Exact-match lookup of a configuration key.
pub fn lookup(key: &str) -> Option<&'static ConfigSetting> {
    SETTINGS.iter().find(|row| row.name == key)
}
