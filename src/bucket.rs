// === Module Header (agents-tooling) START ===
// purpose: Calendar bucketing: the unit of one API query's date range is a single day or a single month
// role: domain/date-math
// inputs: Granularity, NaiveDate start/today, optional min_start clip
// outputs: Bucket values, TimeWindow query bounds, future cutoffs
// side_effects: none (pure)
// invariants:
// - month_bounds returns start <= end or errors; empty windows never escape
// - advance moves exactly one day or one calendar month; December rolls the year
// - Day(d) is future when d >= today; Month is future only when its first day is past today
// errors: invalid months and start-after-end windows surface as anyhow errors carrying both dates
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};

use crate::util::date_to_str;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Granularity {
  Daily,
  Monthly,
}

/// Closed date interval `[start, end]` used as a query's period filter.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TimeWindow {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Bucket {
  Day(NaiveDate),
  Month { year: i32, month: u32 },
}

/// The calendar month immediately following the given one.
/// Domain is month in 1..=12; anything else is a caller bug.
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
  debug_assert!((1..=12).contains(&month), "month out of range: {month}");

  if month == 12 {
    (year + 1, 1)
  } else {
    (year, month + 1)
  }
}

fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
  let (ny, nm) = next_month(year, month);
  let first_next = match NaiveDate::from_ymd_opt(ny, nm, 1) {
    Some(d) => d,
    None => bail!("invalid month {year:04}-{month:02}"),
  };
  // Cannot underflow: first_next is at least year 0, month 2.
  Ok(first_next.pred_opt().expect("day before first of month"))
}

/// Bounds of a calendar month, raised to `min_start` when provided and
/// lowered to `today` when the natural month end is in the future.
///
/// A resulting start after end means the caller asked for a month entirely
/// in the future, or a `min_start` past the month's end; both are contract
/// violations and surface as errors rather than empty windows.
pub fn month_bounds(year: i32, month: u32, min_start: Option<NaiveDate>, today: NaiveDate) -> Result<TimeWindow> {
  if !(1..=12).contains(&month) {
    bail!("invalid month {month} in {year:04}-{month:02}, expected 1..=12");
  }
  let natural_start = NaiveDate::from_ymd_opt(year, month, 1).expect("validated month");
  let natural_end = last_day_of_month(year, month)?;

  let start = match min_start {
    Some(m) if m > natural_start => m,
    _ => natural_start,
  };
  let end = if natural_end > today { today } else { natural_end };

  if start > end {
    bail!(
      "window start {} is after end {} for month {year:04}-{month:02}",
      date_to_str(start),
      date_to_str(end)
    );
  }
  Ok(TimeWindow { start, end })
}

impl Bucket {
  /// First bucket for a stream, derived from the replication starting value.
  pub fn seed(granularity: Granularity, start: NaiveDate) -> Bucket {
    match granularity {
      Granularity::Daily => Bucket::Day(start),
      Granularity::Monthly => Bucket::Month {
        year: start.year(),
        month: start.month(),
      },
    }
  }

  /// The immediately following bucket.
  pub fn advance(self) -> Bucket {
    match self {
      Bucket::Day(d) => Bucket::Day(d.succ_opt().expect("date overflow advancing one day")),
      Bucket::Month { year, month } => {
        let (y, m) = next_month(year, month);
        Bucket::Month { year: y, month: m }
      }
    }
  }

  /// The query window for this bucket. `min_start` only matters for monthly
  /// buckets, where the first window of a stream starts at the replication
  /// date rather than the first of its month.
  pub fn bounds(self, today: NaiveDate, min_start: Option<NaiveDate>) -> Result<TimeWindow> {
    match self {
      Bucket::Day(d) => Ok(TimeWindow { start: d, end: d }),
      Bucket::Month { year, month } => month_bounds(year, month, min_start, today),
    }
  }

  /// Whether fetching this bucket would reach past the data we consider
  /// complete. Daily buckets stop at today (a partial day is never synced);
  /// monthly buckets include the current, partial month.
  pub fn is_future(self, today: NaiveDate) -> bool {
    match self {
      Bucket::Day(d) => d >= today,
      Bucket::Month { year, month } => match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => first > today,
        None => true,
      },
    }
  }

  /// Human label for progress logging: "2021-12-03" or "2021-12".
  pub fn label(&self) -> String {
    match self {
      Bucket::Day(d) => date_to_str(*d),
      Bucket::Month { year, month } => format!("{year:04}-{month:02}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn next_month_rolls_year_at_december() {
    assert_eq!(next_month(2020, 7), (2020, 8));
    assert_eq!(next_month(2020, 12), (2021, 1));
    assert_eq!(next_month(2021, 1), (2021, 2));
  }

  #[test]
  fn month_bounds_full_past_month() {
    let today = d(2022, 6, 15);
    assert_eq!(
      month_bounds(2020, 6, None, today).unwrap(),
      TimeWindow { start: d(2020, 6, 1), end: d(2020, 6, 30) }
    );
    assert_eq!(
      month_bounds(2020, 12, None, today).unwrap(),
      TimeWindow { start: d(2020, 12, 1), end: d(2020, 12, 31) }
    );
    // leap February
    assert_eq!(
      month_bounds(2020, 2, None, today).unwrap(),
      TimeWindow { start: d(2020, 2, 1), end: d(2020, 2, 29) }
    );
  }

  #[test]
  fn month_bounds_clips_end_to_today() {
    let today = d(2021, 11, 15);
    assert_eq!(
      month_bounds(2021, 11, None, today).unwrap(),
      TimeWindow { start: d(2021, 11, 1), end: today }
    );
  }

  #[test]
  fn month_bounds_raises_start_to_min_start() {
    let today = d(2022, 1, 1);
    assert_eq!(
      month_bounds(2021, 11, Some(d(2021, 11, 20)), today).unwrap(),
      TimeWindow { start: d(2021, 11, 20), end: d(2021, 11, 30) }
    );
    // min_start before the month's natural start is a no-op
    assert_eq!(
      month_bounds(2021, 11, Some(d(2021, 10, 1)), today).unwrap(),
      TimeWindow { start: d(2021, 11, 1), end: d(2021, 11, 30) }
    );
  }

  #[test]
  fn month_bounds_rejects_min_start_past_month_end() {
    let today = d(2022, 1, 1);
    assert!(month_bounds(2021, 11, Some(d(2021, 12, 1)), today).is_err());
  }

  #[test]
  fn month_bounds_rejects_month_entirely_in_future() {
    let today = d(2021, 11, 15);
    assert!(month_bounds(2021, 12, None, today).is_err());
  }

  #[test]
  fn month_bounds_rejects_invalid_month() {
    let today = d(2021, 11, 15);
    assert!(month_bounds(2021, 13, None, today).is_err());
    assert!(month_bounds(2021, 0, None, today).is_err());
  }

  #[test]
  fn daily_bucket_advances_one_day() {
    let b = Bucket::Day(d(2021, 1, 30));
    assert_eq!(b.advance(), Bucket::Day(d(2021, 1, 31)));
    assert_eq!(Bucket::Day(d(2021, 1, 31)).advance(), Bucket::Day(d(2021, 2, 1)));
  }

  #[test]
  fn daily_bucket_window_is_single_day() {
    let today = d(2021, 2, 10);
    let w = Bucket::Day(d(2021, 1, 30)).bounds(today, None).unwrap();
    assert_eq!(w.start, w.end);
    assert_eq!(w.start, d(2021, 1, 30));
  }

  #[test]
  fn daily_bucket_today_is_future() {
    let today = d(2021, 2, 10);
    assert!(Bucket::Day(today).is_future(today));
    assert!(Bucket::Day(d(2021, 2, 11)).is_future(today));
    assert!(!Bucket::Day(d(2021, 2, 9)).is_future(today));
  }

  #[test]
  fn monthly_bucket_current_month_is_not_future() {
    let today = d(2021, 11, 15);
    assert!(!Bucket::Month { year: 2021, month: 11 }.is_future(today));
    assert!(Bucket::Month { year: 2021, month: 12 }.is_future(today));
  }

  #[test]
  fn bucket_labels() {
    assert_eq!(Bucket::Day(d(2021, 12, 3)).label(), "2021-12-03");
    assert_eq!(Bucket::Month { year: 2021, month: 12 }.label(), "2021-12");
  }

  proptest! {
    #[test]
    fn next_month_is_always_one_month_later(y in 1990i32..2100, m in 1u32..=12) {
      let (ny, nm) = next_month(y, m);
      prop_assert_eq!(ny as i64 * 12 + nm as i64, y as i64 * 12 + m as i64 + 1);
      prop_assert!((1..=12).contains(&nm));
    }

    #[test]
    fn month_bounds_of_past_months_cover_the_month(y in 1990i32..2020, m in 1u32..=12) {
      let today = d(2021, 1, 1);
      let w = month_bounds(y, m, None, today).unwrap();
      prop_assert_eq!(w.start, d(y, m, 1));
      prop_assert_eq!(w.end.month(), m);
      prop_assert!(w.end.day() >= 28);
      prop_assert_eq!(w.end.succ_opt().unwrap().day(), 1);
    }
  }
}
