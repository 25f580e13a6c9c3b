//! Campaign scheduling rules: which campaigns are showing at a given moment,
//! and which existing campaigns share a proposed date window.

use crate::models::Campaign;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    BadDate(String),
    BadTime(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::BadDate(raw) => write!(f, "not a YYYY-MM-DD date: {raw:?}"),
            ScheduleError::BadTime(raw) => write!(f, "not a HH:MM time: {raw:?}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// The calendar part of a stored date, `2026-01-05T00:00:00Z` -> `2026-01-05`.
pub fn date_part(raw: &str) -> &str {
    raw.split('T').next().unwrap_or_default().trim()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(date_part(raw), "%Y-%m-%d")
        .map_err(|_| ScheduleError::BadDate(raw.to_string()))
}

/// Splits `raw` on `sep` into fixed-width runs of ASCII digits, e.g.
/// `2026-02-30` with widths `[4, 2, 2]`. No range checks: the pieces are
/// compared as written, so `99:99` is later than any real time.
fn digit_fields(raw: &str, sep: char, widths: &[usize]) -> Option<Vec<u32>> {
    let parts: Vec<&str> = raw.split(sep).collect();
    if parts.len() != widths.len() {
        return None;
    }
    parts
        .iter()
        .zip(widths)
        .map(|(part, &width)| {
            (part.len() == width && part.bytes().all(|b| b.is_ascii_digit()))
                .then(|| part.parse().ok())
                .flatten()
        })
        .collect()
}

/// The leading `HH:MM` of a time string as `(hour, minute)`, or `None` when
/// the value does not start with that shape and the bound is ignored.
fn clock_bound(raw: &str) -> Option<(u32, u32)> {
    let head: String = raw.trim().chars().take(5).collect();
    match digit_fields(&head, ':', &[2, 2])?.as_slice() {
        &[hour, minute] => Some((hour, minute)),
        _ => None,
    }
}

/// `YYYY-MM-DD` (date part only) as `(year, month, day)`.
fn date_bound(raw: &str) -> Result<(u32, u32, u32), ScheduleError> {
    match digit_fields(date_part(raw), '-', &[4, 2, 2]).as_deref() {
        Some(&[year, month, day]) => Ok((year, month, day)),
        _ => Err(ScheduleError::BadDate(raw.to_string())),
    }
}

fn within_window(campaign: &Campaign, now: NaiveDateTime) -> Result<bool, ScheduleError> {
    if !campaign.end_date.trim().is_empty() {
        let end = date_bound(&campaign.end_date)?;
        let today = (now.year().max(0) as u32, now.month(), now.day());
        if today > end {
            return Ok(false);
        }
    }

    // Minute resolution, both ends inclusive.
    let clock = (now.hour(), now.minute());

    if let Some(start) = clock_bound(&campaign.start_time) {
        if clock < start {
            return Ok(false);
        }
    }
    if let Some(end) = clock_bound(&campaign.end_time) {
        if clock > end {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether one campaign is showing at `now`.
///
/// `start_date` is deliberately not consulted: an operator can show a
/// campaign ahead of its nominal start by keeping it active. A campaign
/// whose end date cannot be read is shown.
pub fn is_eligible(campaign: &Campaign, now: NaiveDateTime) -> bool {
    if !campaign.is_active {
        return false;
    }
    match within_window(campaign, now) {
        Ok(eligible) => eligible,
        Err(e) => {
            tracing::warn!(campaign_id = campaign.id, "schedule check failed, showing campaign anyway: {e}");
            true
        }
    }
}

/// The campaigns showing at `now`, in their original order.
pub fn select_active(campaigns: &[Campaign], now: NaiveDateTime) -> Vec<Campaign> {
    campaigns
        .iter()
        .filter(|campaign| is_eligible(campaign, now))
        .cloned()
        .collect()
}

/// Labels of existing campaigns whose start and end dates both equal the
/// proposed ones. Overlapping windows are fine, only exact copies collide.
pub fn find_duplicates(
    campaigns: &[Campaign],
    proposed_start: &str,
    proposed_end: &str,
    exclude_id: Option<i64>,
) -> Vec<String> {
    let start = date_part(proposed_start);
    let end = date_part(proposed_end);

    campaigns
        .iter()
        .filter(|campaign| Some(campaign.id) != exclude_id)
        .filter(|campaign| date_part(&campaign.start_date) == start && date_part(&campaign.end_date) == end)
        .map(|campaign| {
            format!(
                "{} ({} - {})",
                campaign.title,
                date_part(&campaign.start_date),
                date_part(&campaign.end_date)
            )
        })
        .collect()
}

/// Canonical stored form of an operator-entered date; empty stays empty.
pub fn normalize_date(raw: &str) -> Result<String, ScheduleError> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(parse_date(raw)?.format("%Y-%m-%d").to_string())
}

/// Canonical stored form of an operator-entered time (`HH:MM` or `HH:MM:SS`,
/// also the time part of a date-time); empty stays empty.
pub fn normalize_time(raw: &str) -> Result<String, ScheduleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let clock = trimmed
        .split_once('T')
        .map(|(_, time)| time)
        .unwrap_or(trimmed);
    let clock = clock
        .split(['.', 'Z', '+'])
        .next()
        .unwrap_or_default();
    NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M"))
        .map(|t| t.format("%H:%M:%S").to_string())
        .map_err(|_| ScheduleError::BadTime(raw.to_string()))
}
