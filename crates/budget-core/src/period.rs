//! Billing periods: the partition key for budgets and their accumulators.
//!
//! A period is identified by the year and month of its start date. With the
//! default anchor day of 1 this is the calendar month; with anchor day `d` a
//! period runs from day `d` of one month up to (excluding) day `d` of the next,
//! with `d` clamped to the length of short months.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

// ─── Key ─────────────────────────────────────────────────────────────────────

/// Canonical billing-period identifier, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
  year:  i32,
  month: u32,
}

impl PeriodKey {
  /// Earliest representable period, `0001-01`.
  pub const FIRST: Self = Self { year: 1, month: 1 };
  /// Latest representable period, `9999-12`.
  pub const LAST: Self = Self { year: 9999, month: 12 };

  pub fn new(year: i32, month: u32) -> Result<Self> {
    if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
      return Err(Error::InvalidPeriodKey(format!("{year:04}-{month:02}")));
    }
    Ok(Self { year, month })
  }

  pub fn year(&self) -> i32 { self.year }

  pub fn month(&self) -> u32 { self.month }

  /// The period immediately before this one. Saturates at [`Self::FIRST`].
  pub fn previous(&self) -> Self {
    if *self <= Self::FIRST {
      Self::FIRST
    } else if self.month == 1 {
      Self { year: self.year - 1, month: 12 }
    } else {
      Self { year: self.year, month: self.month - 1 }
    }
  }

  /// The period immediately after this one. Saturates at [`Self::LAST`].
  pub fn next(&self) -> Self {
    if *self >= Self::LAST {
      Self::LAST
    } else if self.month == 12 {
      Self { year: self.year + 1, month: 1 }
    } else {
      Self { year: self.year, month: self.month + 1 }
    }
  }

  fn first_of_month(&self) -> NaiveDate {
    NaiveDate::from_ymd_opt(self.year, self.month, 1)
      .unwrap_or(NaiveDate::MIN)
  }
}

impl fmt::Display for PeriodKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl FromStr for PeriodKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidPeriodKey(s.to_owned());
    let (year, month) = s.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
      return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    Self::new(year, month).map_err(|_| invalid())
  }
}

impl Serialize for PeriodKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for PeriodKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Maps dates to the period that contains them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodResolver {
  anchor_day: u32,
}

impl Default for PeriodResolver {
  fn default() -> Self { Self { anchor_day: 1 } }
}

impl PeriodResolver {
  /// `anchor_day` is clamped into `1..=31`.
  pub fn new(anchor_day: u32) -> Self {
    Self { anchor_day: anchor_day.clamp(1, 31) }
  }

  pub fn anchor_day(&self) -> u32 { self.anchor_day }

  /// The period containing `date`. Dates outside years 1..=9999 land in the
  /// first or last period.
  pub fn period_of(&self, date: NaiveDate) -> PeriodKey {
    let this_month = match date.year() {
      y if y < 1 => return PeriodKey::FIRST,
      y if y > 9999 => return PeriodKey::LAST,
      y => PeriodKey { year: y, month: date.month() },
    };
    if date >= self.start_of(this_month) {
      this_month
    } else {
      this_month.previous()
    }
  }

  /// First day of `key`'s period.
  pub fn start_of(&self, key: PeriodKey) -> NaiveDate {
    let first = key.first_of_month();
    let day = self.anchor_day.min(days_in_month(first));
    first.with_day(day).unwrap_or(first)
  }

  /// Half-open `[start, end)` date window of `key`'s period. The last period
  /// runs to the end of the calendar.
  pub fn bounds(&self, key: PeriodKey) -> (NaiveDate, NaiveDate) {
    let end = match key.next() {
      next if next == key => NaiveDate::MAX,
      next => self.start_of(next),
    };
    (self.start_of(key), end)
  }

  pub fn contains(&self, key: PeriodKey, date: NaiveDate) -> bool {
    let (start, end) = self.bounds(key);
    start <= date && date < end
  }
}

/// Number of days in `date`'s month.
pub fn days_in_month(date: NaiveDate) -> u32 {
  let first = date.with_day(1).unwrap_or(date);
  match first.checked_add_months(Months::new(1)) {
    Some(next) => (next - first).num_days() as u32,
    None => 31,
  }
}
