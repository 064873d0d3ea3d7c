use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed conversion factor between fluid ounces and milliliters.
pub const ML_PER_FL_OZ: f64 = 29.5735;

/// Fallback hydration goal when a user has neither a per-day goal nor a
/// stored default.
pub const DEFAULT_WATER_GOAL_ML: f64 = 2000.0;

/// Length of a connection code: 16 random bytes, hex encoded.
pub const CONNECTION_CODE_LEN: usize = 32;

/// Minutes a connection code stays redeemable after issuance.
pub const CONNECTION_CODE_TTL_MINUTES: i64 = 15;

pub fn oz_to_ml(oz: f64) -> f64 {
    oz * ML_PER_FL_OZ
}

/// Calendar date key used for per-day goal lookups, always formatted
/// `YYYY-MM-DD`. Lookups are exact-string matches, so the constructor
/// canonicalizes whatever it parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalDate(String);

#[derive(Debug, thiserror::Error)]
#[error("invalid date, expected YYYY-MM-DD")]
pub struct GoalDateError;

impl GoalDate {
    pub fn today_utc() -> Self {
        GoalDate(chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for GoalDate {
    type Err = GoalDateError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| GoalDateError)?;
        Ok(GoalDate(date.format("%Y-%m-%d").to_string()))
    }
}
