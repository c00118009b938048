//! Time literal parsing and duration formatting
//!
//! Plan files carry polymorphic time fields: a bare number is seconds, a
//! string is either a duration (`1h30m`, `0:10:00`) or an absolute instant
//! (ISO-8601). This module normalizes all of them eagerly against an anchor
//! instant, so nothing downstream ever sees the raw form.
//!
//! Also home to the cursor arithmetic: cursors are taken modulo
//! `duration + 1µs`, the extra microsecond letting a cursor legally sit at
//! exactly `duration` instead of wrapping to zero.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ScheduleError;

/// A raw time field as it appears in a plan file: seconds or a string form.
///
/// Resolved against an anchor with [`to_instant`] / [`to_duration`] at load
/// time; the un-normalized form never travels past the parser boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeLiteral {
    Seconds(f64),
    Text(String),
}

/// Resolve a time literal to an absolute instant.
///
/// Duration forms (numbers, `NhNmNs`, `H:M:S`) add to `anchor`; absolute
/// strings parse directly. Missing or empty input yields `default`.
pub fn to_instant(
    literal: Option<&TimeLiteral>,
    anchor: DateTime<Utc>,
    default: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    match literal {
        None => Ok(default),
        Some(TimeLiteral::Seconds(secs)) => Ok(Some(anchor + duration_from_secs(*secs))),
        Some(TimeLiteral::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            if let Some(delta) = parse_duration_text(trimmed) {
                return Ok(Some(anchor + delta));
            }
            if let Some(instant) = parse_instant_text(trimmed) {
                return Ok(Some(instant));
            }
            Err(ScheduleError::bad_time_literal(text))
        }
    }
}

/// Resolve a time literal to a duration.
///
/// Duration forms parse directly; an absolute string becomes
/// `instant - anchor` (which may be negative). Missing or empty input yields
/// `default`.
pub fn to_duration(
    literal: Option<&TimeLiteral>,
    anchor: DateTime<Utc>,
    default: Option<Duration>,
) -> Result<Option<Duration>, ScheduleError> {
    match literal {
        None => Ok(default),
        Some(TimeLiteral::Seconds(secs)) => Ok(Some(duration_from_secs(*secs))),
        Some(TimeLiteral::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            if let Some(delta) = parse_duration_text(trimmed) {
                return Ok(Some(delta));
            }
            if let Some(instant) = parse_instant_text(trimmed) {
                return Ok(Some(instant - anchor));
            }
            Err(ScheduleError::bad_time_literal(text))
        }
    }
}

/// Parse a duration string in compact (`1h30m`, `45s`) or colon
/// (`0:10:00`, `1:02:03.5`) form. Returns `None` when neither form matches.
pub fn parse_duration_text(text: &str) -> Option<Duration> {
    let compact = Regex::new(r"^\s*(?:(\d+)\s*[Hh])?\s*(?:(\d+)\s*[Mm])?\s*(?:(\d+)\s*[Ss])?\s*$")
        .ok()?;
    if let Some(caps) = compact.captures(text) {
        // the all-optional pattern also matches whitespace; demand a component
        if caps.get(1).is_some() || caps.get(2).is_some() || caps.get(3).is_some() {
            let hours: i64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let minutes: i64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let seconds: i64 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            return Some(Duration::seconds(hours * 3600 + minutes * 60 + seconds));
        }
    }

    let colon = Regex::new(r"^(\d+):(\d+):(\d+(?:\.\d+)?)$").ok()?;
    if let Some(caps) = colon.captures(text) {
        let hours: i64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: i64 = caps.get(2)?.as_str().parse().ok()?;
        let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
        return Some(
            Duration::seconds(hours * 3600 + minutes * 60) + duration_from_secs(seconds),
        );
    }

    None
}

/// Parse an absolute instant from common ISO-8601 shapes.
///
/// RFC3339 with timezone first, then naive datetime formats assumed UTC,
/// then a bare date (midnight UTC).
pub fn parse_instant_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive_formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in &naive_formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0)?,
            Utc,
        ));
    }

    None
}

/// Convert fractional seconds to a `Duration` with microsecond resolution.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

/// Total microseconds of a duration, saturating far beyond any real media.
fn total_micros(d: Duration) -> i64 {
    d.num_microseconds().unwrap_or(i64::MAX)
}

/// Cursor modulo: `a mod (b + 1µs)`.
///
/// The +1µs keeps `fmod_duration(d, d) == d`, so a clip that played to the
/// end keeps a cursor of exactly `duration` instead of wrapping to zero.
pub fn fmod_duration(a: Duration, b: Duration) -> Duration {
    let modulus = total_micros(b).saturating_add(1);
    if modulus <= 0 {
        return Duration::zero();
    }
    Duration::microseconds(total_micros(a) % modulus)
}

/// Render a duration as `H:MM:SS`, with a `.micros` suffix when sub-second
/// precision is present. Hours are unpadded. This is the artifact rendering.
pub fn format_hms(d: Duration) -> String {
    let micros = total_micros(d);
    let (sign, micros) = if micros < 0 {
        ("-", -micros)
    } else {
        ("", micros)
    };
    let secs = micros / 1_000_000;
    let frac = micros % 1_000_000;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if frac == 0 {
        format!("{}{}:{:02}:{:02}", sign, hours, minutes, seconds)
    } else {
        format!("{}{}:{:02}:{:02}.{:06}", sign, hours, minutes, seconds, frac)
    }
}

/// Inverse of [`format_hms`], used when reloading persisted timelines.
pub fn parse_hms(text: &str) -> Result<Duration, ScheduleError> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = parse_duration_text(body)
        .ok_or_else(|| ScheduleError::bad_time_literal(text))?;
    Ok(if negative { -parsed } else { parsed })
}

/// Serde adapter for duration fields rendered as `H:MM:SS[.micros]`.
///
/// Use with `#[serde(with = "crate::utils::time::hms_duration")]`.
pub mod hms_duration {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_hms(*d))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse_hms(&text).map_err(serde::de::Error::custom)
    }
}
