//! Time-of-day values shared by the sync schedule and the rest windows

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MINUTES_PER_DAY: usize = 24 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid time '{0}', expected HH:MM (00:00-23:59)")]
pub struct InvalidTimeFormat(pub String);

/// Wall-clock time of day with minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes elapsed since midnight
    pub fn minute_of_day(&self) -> usize {
        self.hour as usize * 60 + self.minute as usize
    }

    pub fn from_minute_of_day(minutes: usize) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    pub fn to_naive(&self) -> chrono::NaiveTime {
        chrono::NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)
            .unwrap_or(chrono::NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTimeFormat(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;

        let digits_only = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits_only(hour) || hour.len() > 2 || !digits_only(minute) || minute.len() != 2 {
            return Err(invalid());
        }

        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
