//! Resource paths for the domain operations.

use chrono::NaiveDate;
use std::fmt;

pub const PROFILE_PATH: &str = "/user/-/profile.json";
pub const BADGES_PATH: &str = "/user/-/badges.json";

pub const DEFAULT_PERIOD: &str = "7d";

/// Periods the time-series endpoint accepts. Not enforced client side: an
/// unknown period is sent as-is and rejected by Fitbit.
pub const TIME_SERIES_PERIODS: &[&str] = &["1d", "7d", "30d", "1w", "1m", "3m", "6m", "1y"];

/// Date segment of a resource path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActivityDate {
    /// Fitbit's `today`, resolved in the user's own timezone
    #[default]
    Today,
    Day(NaiveDate),
}

impl fmt::Display for ActivityDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityDate::Today => f.write_str("today"),
            ActivityDate::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl From<NaiveDate> for ActivityDate {
    fn from(date: NaiveDate) -> Self {
        ActivityDate::Day(date)
    }
}

pub fn is_known_period(period: &str) -> bool {
    TIME_SERIES_PERIODS.contains(&period)
}

pub fn daily_activity_summary_path(date: ActivityDate) -> String {
    format!("/user/-/activities/date/{date}.json")
}

/// `resource_path` is a Fitbit resource such as `activities/steps`.
pub fn activity_time_series_path(resource_path: &str, date: ActivityDate, period: &str) -> String {
    format!(
        "/user/-/{}/date/{date}/{period}.json",
        resource_path.trim_matches('/')
    )
}
