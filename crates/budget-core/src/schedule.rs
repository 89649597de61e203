//! Recurring schedule calculation.
//!
//! Everything here is a pure function of its arguments: no clock, no
//! randomness. Monthly and yearly steps keep the anchor's day of month and
//! clamp it to the target month, so an obligation anchored on the 31st falls
//! on the last day of shorter months and returns to the 31st afterwards.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::period::days_in_month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
  Daily,
  Weekly,
  Monthly,
  Yearly,
}

/// The occurrence after `last`, for a series anchored at `anchor`.
///
/// Returns `None` only when the date would overflow the calendar.
pub fn advance(frequency: Frequency, anchor: NaiveDate, last: NaiveDate) -> Option<NaiveDate> {
  match frequency {
    Frequency::Daily => last.checked_add_signed(Duration::days(1)),
    Frequency::Weekly => last.checked_add_signed(Duration::days(7)),
    Frequency::Monthly => {
      let first = last.with_day(1)?.checked_add_months(Months::new(1))?;
      Some(clamped_day(first, anchor.day()))
    }
    Frequency::Yearly => {
      let first = NaiveDate::from_ymd_opt(last.year().checked_add(1)?, anchor.month(), 1)?;
      Some(clamped_day(first, anchor.day()))
    }
  }
}

/// The next occurrence due for a series.
///
/// With nothing processed yet the anchor itself is the first occurrence;
/// otherwise the series advances one step past `last_processed`. An occurrence
/// after `end` is terminal (`None`).
pub fn next_due(
  frequency: Frequency,
  anchor: NaiveDate,
  last_processed: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Option<NaiveDate> {
  let candidate = match last_processed {
    None => anchor,
    Some(last) => advance(frequency, anchor, last)?,
  };
  match end {
    Some(end) if candidate > end => None,
    _ => Some(candidate),
  }
}

/// Every occurrence of the series in `[from, to)`, starting from the anchor.
pub fn occurrences_between(
  frequency: Frequency,
  anchor: NaiveDate,
  end: Option<NaiveDate>,
  from: NaiveDate,
  to: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
  let mut cursor = next_due(frequency, anchor, None, end);
  std::iter::from_fn(move || {
    let current = cursor?;
    cursor = next_due(frequency, anchor, Some(current), end);
    Some(current)
  })
  .skip_while(move |d| *d < from)
  .take_while(move |d| *d < to)
}

fn clamped_day(first_of_month: NaiveDate, day: u32) -> NaiveDate {
  let day = day.min(days_in_month(first_of_month));
  first_of_month.with_day(day).unwrap_or(first_of_month)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  #[test]
  fn first_occurrence_is_the_anchor() {
    assert_eq!(next_due(Frequency::Monthly, d(2024, 1, 1), None, None), Some(d(2024, 1, 1)));
  }

  #[test]
  fn daily_and_weekly_steps() {
    let a = d(2024, 12, 28);
    assert_eq!(next_due(Frequency::Daily, a, Some(d(2024, 12, 31)), None), Some(d(2025, 1, 1)));
    assert_eq!(next_due(Frequency::Weekly, a, Some(a), None), Some(d(2025, 1, 4)));
  }

  #[test]
  fn monthly_clamps_to_leap_february() {
    let a = d(2024, 1, 31);
    assert_eq!(next_due(Frequency::Monthly, a, Some(a), None), Some(d(2024, 2, 29)));
  }

  #[test]
  fn monthly_returns_to_anchor_day_after_short_month() {
    let a = d(2023, 1, 31);
    let feb = next_due(Frequency::Monthly, a, Some(a), None).unwrap();
    assert_eq!(feb, d(2023, 2, 28));
    assert_eq!(next_due(Frequency::Monthly, a, Some(feb), None), Some(d(2023, 3, 31)));
    assert_eq!(next_due(Frequency::Monthly, a, Some(d(2023, 3, 31)), None), Some(d(2023, 4, 30)));
  }

  #[test]
  fn yearly_leap_day_anchor() {
    let a = d(2024, 2, 29);
    let y1 = next_due(Frequency::Yearly, a, Some(a), None).unwrap();
    assert_eq!(y1, d(2025, 2, 28));
    let y4 = (0..3).fold(y1, |last, _| advance(Frequency::Yearly, a, last).unwrap());
    assert_eq!(y4, d(2028, 2, 29));
  }

  #[test]
  fn occurrences_after_end_are_terminal() {
    let a = d(2024, 1, 1);
    let end = Some(d(2024, 2, 15));
    assert_eq!(next_due(Frequency::Monthly, a, Some(d(2024, 1, 1)), end), Some(d(2024, 2, 1)));
    assert_eq!(next_due(Frequency::Monthly, a, Some(d(2024, 2, 1)), end), None);
    assert_eq!(next_due(Frequency::Monthly, d(2024, 3, 1), None, end), None);
  }

  #[test]
  fn stable_for_identical_inputs() {
    let a = d(2024, 5, 31);
    let first = next_due(Frequency::Monthly, a, Some(d(2024, 8, 31)), None);
    for _ in 0..10 {
      assert_eq!(next_due(Frequency::Monthly, a, Some(d(2024, 8, 31)), None), first);
    }
  }

  #[test]
  fn occurrences_in_window() {
    let got: Vec<_> =
      occurrences_between(Frequency::Weekly, d(2024, 1, 1), None, d(2024, 1, 10), d(2024, 2, 1))
        .collect();
    assert_eq!(got, vec![d(2024, 1, 15), d(2024, 1, 22), d(2024, 1, 29)]);
  }
}
