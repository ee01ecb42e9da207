use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::streams::StreamDef;
use crate::util::date_to_str;

/// A raw API row or a normalized output record: column name to scalar value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Sentinel the API uses for hours it cannot attribute. The hour column is
/// part of the composite primary key, so nulls are not an option; we
/// substitute an out-of-range integer instead.
const NOT_APPLICABLE: &str = "N/A";
const HOUR_SENTINEL: i64 = -1;

static MONTH_BY_NAME: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
  HashMap::from([
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
  ])
});

fn month_name_to_int(name: &str) -> Option<u32> {
  MONTH_BY_NAME.get(name.to_ascii_lowercase().as_str()).copied()
}

/// Normalize one raw row into the declared output shape.
///
/// Substitutes the hour sentinel, synthesizes the `date` replication key for
/// monthly streams (first day of the row's year/month pair), and passes
/// every other field through untouched. Applying it twice is a no-op.
pub fn post_process(mut row: Row, stream: &StreamDef) -> Result<Row> {
  if let Some(hour) = row.get("visit_hour") {
    if hour.as_str() == Some(NOT_APPLICABLE) {
      row.insert("visit_hour".into(), serde_json::Value::from(HOUR_SENTINEL));
    }
  }

  if !row.contains_key("date") {
    // monthly streams query by month but still need a per-record date
    let date = synthesize_date(&row).with_context(|| format!("deriving date for a {} row", stream.name))?;
    row.insert("date".into(), serde_json::Value::from(date));
  }

  Ok(row)
}

fn synthesize_date(row: &Row) -> Result<String> {
  let year = match row.get("date_year").and_then(year_as_i32) {
    Some(y) => y,
    None => bail!("row has no date and no usable date_year: {:?}", row.get("date_year")),
  };
  let month_name = match row.get("date_month").and_then(|v| v.as_str()) {
    Some(m) => m,
    None => bail!("row has no date and no date_month: {:?}", row.get("date_month")),
  };
  let month = match month_name_to_int(month_name) {
    Some(m) => m,
    None => bail!("unknown month name {month_name:?}"),
  };
  let first = match NaiveDate::from_ymd_opt(year, month, 1) {
    Some(d) => d,
    None => bail!("invalid year/month pair {year}/{month}"),
  };

  Ok(date_to_str(first))
}

// The API is not consistent about numeric columns arriving as numbers or
// strings; accept both for the year.
fn year_as_i32(v: &serde_json::Value) -> Option<i32> {
  if let Some(n) = v.as_i64() {
    return i32::try_from(n).ok();
  }
  v.as_str().and_then(|s| s.parse().ok())
}
