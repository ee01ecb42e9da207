use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::CommandFactory;

/// Date format used by the AT Internet API for period bounds and by our
/// replication keys. Everything date-shaped in this crate goes through it.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn date_to_str(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

pub fn str_to_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("parsing date {s:?}, expected YYYY-MM-DD"))
}

/// Parse a `--now-override` string into a calendar date.
/// Invalid input is treated as absent; the flag exists for tests only.
pub fn parse_now_override(s: Option<&str>) -> Option<NaiveDate> {
  s.and_then(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT).ok())
}

/// Returns the effective "today" given an optional override.
///
/// Centralizes our handling of test determinism without sprinkling
/// `Local::now()` through the cursor and window code.
pub fn effective_today(override_today: Option<NaiveDate>) -> NaiveDate {
  override_today.unwrap_or_else(|| Local::now().date_naive())
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}
