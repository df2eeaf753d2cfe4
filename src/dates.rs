use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::models::{CanonicalDay, Record};

static ISO_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})[-/]?([0-9]{2})[-/]?([0-9]{2})").expect("static pattern compiles")
});

/// Numbers below this are epoch seconds, the rest epoch milliseconds.
const SECONDS_CUTOFF: f64 = 1e12;
/// Largest representable instant, in milliseconds from the epoch.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Non-ASCII decimal digit blocks; each starts at its zero.
const DIGIT_ZEROS: [u32; 4] = [0x0660, 0x06F0, 0x07C0, 0x0966];

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%m.%d.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%a %b %d %Y",
    "%a, %d %b %Y",
    "%A, %B %d, %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
];

const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", " %H:%M", ", %H:%M:%S", ", %I:%M:%S %p", ", %I:%M %p"];

#[derive(Debug, Clone, Copy)]
pub enum DateValue<'a> {
    Text(&'a str),
    Epoch(f64),
    Instant(DateTime<Utc>),
    Local(NaiveDateTime),
    Day(NaiveDate),
}

pub fn normalize_record(record: &Record, aliases: &[&str]) -> Option<CanonicalDay> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .filter_map(date_value)
        .find_map(normalize_value)
}

fn date_value(value: &Value) -> Option<DateValue<'_>> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(DateValue::Text(text)),
        Value::Number(number) => number.as_f64().map(DateValue::Epoch),
        _ => None,
    }
}

pub fn normalize_value(value: DateValue<'_>) -> Option<CanonicalDay> {
    match value {
        DateValue::Text(text) => normalize_text(text),
        DateValue::Epoch(number) => from_epoch(number),
        DateValue::Instant(instant) => Some(instant.with_timezone(&Local).date_naive().into()),
        DateValue::Local(datetime) => Some(datetime.date().into()),
        DateValue::Day(date) => Some(date.into()),
    }
}

pub fn normalize_text(raw: &str) -> Option<CanonicalDay> {
    let text = ascii_digits(raw.trim());
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_PREFIX.captures(&text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return CanonicalDay::from_ymd(year, month, day);
    }

    parse_general(&text).and_then(normalize_value)
}

pub fn from_epoch(number: f64) -> Option<CanonicalDay> {
    if !number.is_finite() {
        return None;
    }
    let scaled = if number < SECONDS_CUTOFF {
        number * 1000.0
    } else {
        number
    };
    let millis = scaled.trunc();
    if millis.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    let instant = DateTime::from_timestamp_millis(millis as i64)?;
    Some(instant.with_timezone(&Local).date_naive().into())
}

/// Rewrites Arabic-Indic, Extended Arabic-Indic, NKo/Thaana-block and
/// Devanagari digits as ASCII.
pub fn ascii_digits(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = c as u32;
            DIGIT_ZEROS
                .iter()
                .find(|zero| (**zero..**zero + 10).contains(&code))
                .and_then(|zero| char::from_digit(code - zero, 10))
                .unwrap_or(c)
        })
        .collect()
}

fn parse_general(text: &str) -> Option<DateValue<'static>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(DateValue::Instant(instant.to_utc()));
    }
    if let Ok(instant) = DateTime::parse_from_rfc2822(text) {
        return Some(DateValue::Instant(instant.to_utc()));
    }

    // `Date#toString` output: "Sun Mar 10 2024 14:00:00 GMT+0100 (Zone Name)"
    let without_zone_name = text.split(" (").next().unwrap_or(text).trim();
    if let Ok(instant) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Some(DateValue::Instant(instant.to_utc()));
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(DateValue::Day(date));
        }
        for suffix in TIME_SUFFIXES {
            let with_time = format!("{format}{suffix}");
            if let Ok(datetime) = NaiveDateTime::parse_from_str(text, &with_time) {
                return Some(DateValue::Local(datetime));
            }
        }
    }

    None
}
