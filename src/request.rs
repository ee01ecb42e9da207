use serde::Serialize;

use crate::bucket::TimeWindow;
use crate::cursor::PageCursor;
use crate::streams::StreamDef;
use crate::util::date_to_str;

// The getData POST body. Field names and nesting follow the v3 wire format
// exactly; see https://developers.atinternet-solutions.com/data-api-en/
// reporting-api-v3/getting-started/how-does-it-work/

#[derive(Debug, Clone, Serialize)]
pub struct Payload {
  pub space: Space,
  pub columns: Vec<String>,
  pub period: Period,
  pub filter: serde_json::Value,
  pub sort: Vec<String>,
  #[serde(rename = "max-results")]
  pub max_results: u32,
  #[serde(rename = "page-num")]
  pub page_num: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Space {
  pub s: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Period {
  pub p1: Vec<PeriodRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodRange {
  #[serde(rename = "type")]
  pub kind: String,
  pub start: String,
  pub end: String,
}

impl PeriodRange {
  fn day_range(window: &TimeWindow) -> PeriodRange {
    PeriodRange {
      kind: "D".into(),
      start: date_to_str(window.start),
      end: date_to_str(window.end),
    }
  }
}

/// Assemble the outbound query for one cursor position.
///
/// Pure: echoes the cursor's window and page, concatenates the stream's
/// metric then property columns, and attaches the optional substring filter
/// on `page_full_name` (`$lk` is the API's "contains" operator). The sort
/// key is arbitrary but mandatory; the API rejects unsorted requests.
pub fn build_payload(
  stream: &StreamDef,
  cursor: &PageCursor,
  site_id: u64,
  filter_str: Option<&str>,
  max_results: u32,
) -> Payload {
  let filter = match filter_str {
    Some(s) if !s.is_empty() => serde_json::json!({
      "property": {"page_full_name": {"$lk": s}}
    }),
    _ => serde_json::json!({}),
  };

  Payload {
    space: Space { s: vec![site_id] },
    columns: stream.columns(),
    period: Period {
      p1: vec![PeriodRange::day_range(&cursor.window)],
    },
    filter,
    sort: vec!["-m_visits".into()],
    max_results,
    page_num: cursor.page,
  }
}
