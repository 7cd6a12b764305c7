use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::dataset::DATETIME_FORMAT;

static COUNTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+\(passengers:(\d+)\s+crew:(\d+)\)").unwrap());

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y", "%d %B %Y"];
const TIME_FORMATS: &[&str] = &["%H%M", "%H:%M", "%H:%M:%S"];

/// How a missing datetime is written into the hash input, matching existing ids.
const NULL_DATETIME_STAMP: &str = "NaT";

pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_OPERATOR: &str = "Unknown Operator";

/// Passenger and crew split of an aboard or fatalities cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub passengers: u32,
    pub crew: u32,
}

impl Counts {
    pub fn total(&self) -> u32 {
        self.passengers.saturating_add(self.crew)
    }
}

/// `"?"` means unknown time; everything is left-padded to four characters.
pub fn normalize_time(raw: &str) -> String {
    let time = if raw == "?" { "0000" } else { raw };
    let width = time.chars().count();
    let padded = if width < 4 {
        format!("{}{}", "0".repeat(4 - width), time)
    } else {
        time.to_string()
    };
    padded.replace("::", ":")
}

pub fn parse_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let combined = format!("{} {}", date.trim(), time.trim());
    DATE_FORMATS.iter().find_map(|d| {
        TIME_FORMATS.iter().find_map(|t| {
            NaiveDateTime::parse_from_str(&combined, &format!("{} {}", d, t)).ok()
        })
    })
}

/// Best-effort identifier: MD5 of `"<DateTime>_<Location>"` using the raw location.
/// A missing datetime is written as `NaT`.
pub fn content_hash(datetime: Option<&NaiveDateTime>, raw_location: &str) -> String {
    let stamp = datetime
        .map(|dt| dt.format(DATETIME_FORMAT).to_string())
        .unwrap_or_else(|| NULL_DATETIME_STAMP.to_string());
    format!("{:x}", md5::compute(format!("{}_{}", stamp, raw_location)))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn clean_location(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_near = trimmed.strip_prefix("Near ").unwrap_or(trimmed);
    collapse_whitespace(without_near)
}

pub fn clean_operator(raw: &str) -> String {
    let operator = collapse_whitespace(raw);
    match operator.as_str() {
        "?" | "Unknown" | "unknown" => UNKNOWN_OPERATOR.to_string(),
        _ => operator,
    }
}

pub fn unknown_if_missing(raw: &str) -> String {
    if raw == "?" {
        UNKNOWN.to_string()
    } else {
        raw.to_string()
    }
}

/// `None` when the text does not contain `"<n> (passengers:<p> crew:<c>)"`.
pub fn parse_counts(text: &str) -> Option<Counts> {
    let caps = COUNTS_RE.captures(text)?;
    Some(Counts {
        passengers: caps[2].parse().ok()?,
        crew: caps[3].parse().ok()?,
    })
}

pub fn parse_ground(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}
