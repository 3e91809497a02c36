//! Where "now" sits inside a selected calendar year.
//!
//! Year lengths come from UTC calendar boundaries, so leap years carry the
//! extra day without any special casing.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeContext {
    pub total_seconds: f64,
    /// Always within `[0, total_seconds]`
    pub elapsed_seconds: f64,
    /// True only for the current, unfinished year
    pub is_live: bool,
}

const FALLBACK_YEAR_SECS: f64 = 365.0 * 86_400.0;

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Seconds between Jan 1 of `year` and Jan 1 of `year + 1`, UTC.
pub fn year_seconds(year: i32) -> f64 {
    match (year_start(year), year.checked_add(1).and_then(year_start)) {
        (Some(start), Some(end)) => (end - start).num_seconds() as f64,
        _ => FALLBACK_YEAR_SECS,
    }
}

pub fn compute(year: i32, now: DateTime<Utc>) -> TimeContext {
    let total_seconds = year_seconds(year);
    let current = now.year();
    if year < current {
        return TimeContext { total_seconds, elapsed_seconds: total_seconds, is_live: false };
    }
    if year > current {
        return TimeContext { total_seconds, elapsed_seconds: 0.0, is_live: false };
    }
    let since_start = year_start(year)
        .map(|start| (now - start).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);
    let elapsed_seconds = since_start.clamp(0.0, total_seconds);
    TimeContext {
        total_seconds,
        elapsed_seconds,
        is_live: elapsed_seconds < total_seconds,
    }
}

/// Counter inputs for a full-year total at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveParams {
    pub target_value: f64,
    pub rate_per_second: f64,
    pub ceiling: f64,
}

impl LiveParams {
    pub fn from_total(total: f64, ctx: &TimeContext) -> Self {
        let ceiling = if total.is_finite() { total.max(0.0) } else { 0.0 };
        let rate_per_second = if ctx.is_live && ceiling > 0.0 {
            ceiling / ctx.total_seconds
        } else {
            0.0
        };
        let target_value = ceiling * (ctx.elapsed_seconds / ctx.total_seconds);
        Self { target_value, rate_per_second, ceiling }
    }

    /// Fixed value, no motion.
    pub fn fixed(value: f64) -> Self {
        let v = if value.is_finite() { value.max(0.0) } else { 0.0 };
        Self { target_value: v, rate_per_second: 0.0, ceiling: v }
    }
}
