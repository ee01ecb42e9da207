// === Module Header (agents-tooling) START ===
// purpose: Per-stream extraction loop: seed cursor, request pages, post-process and emit rows, persist state
// role: processing/orchestrator
// inputs: EffectiveConfig, DataApi, Emitter, State, effective today
// outputs: SCHEMA/RECORD/STATE messages on the emitter; updated state file; SyncSummary
// side_effects: network via DataApi; writes the state file; tracing to stderr
// invariants:
// - SCHEMA precedes a stream's first RECORD; STATE follows each completed stream
// - bookmarks only move forward, to the max date among emitted records
// - streams run strictly sequentially; a failure aborts the run after earlier streams persisted
// errors: propagated with stream name and bucket/page context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use tracing::{debug, info};

use crate::cli::EffectiveConfig;
use crate::client::DataApi;
use crate::cursor::PageCursor;
use crate::emit::Emitter;
use crate::record::post_process;
use crate::request::build_payload;
use crate::state::State;
use crate::streams::{self, StreamDef};
use crate::util::str_to_date;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
  pub streams: usize,
  pub records: u64,
  pub requests: u64,
}

/// Run the configured streams in order, strictly sequentially.
///
/// Each stream owns its cursor; a stream failure aborts the run but state
/// for streams that already completed has been persisted and emitted.
pub fn run_sync<W: Write>(
  cfg: &EffectiveConfig,
  api: &dyn DataApi,
  emitter: &mut Emitter<W>,
  state: &mut State,
  today: NaiveDate,
) -> Result<SyncSummary> {
  let selected = streams::select(&cfg.streams)?;
  let mut summary = SyncSummary::default();

  for stream in selected {
    let (records, requests) = sync_stream(cfg, api, emitter, state, stream, today)
      .with_context(|| format!("syncing stream {:?}", stream.name))?;
    summary.streams += 1;
    summary.records += records;
    summary.requests += requests;
  }

  emitter.flush()?;
  info!(
    streams = summary.streams,
    records = summary.records,
    requests = summary.requests,
    "sync complete"
  );

  Ok(summary)
}

/// One stream's request/response/cursor-advance loop.
///
/// The only blocking operation is the `get_data` call; everything between
/// calls is pure computation on the previous response. Note the bookmark
/// day/month is re-fetched on the next run by design, so incremental runs
/// can emit duplicates; downstream consumers dedupe by the composite key.
fn sync_stream<W: Write>(
  cfg: &EffectiveConfig,
  api: &dyn DataApi,
  emitter: &mut Emitter<W>,
  state: &mut State,
  stream: &StreamDef,
  today: NaiveDate,
) -> Result<(u64, u64)> {
  let start = match state.bookmark_date(stream.name)? {
    Some(bookmark) => bookmark,
    None => cfg.start_date,
  };

  emitter.schema(stream)?;

  let mut cursor = Some(PageCursor::initial(stream.granularity, start, today)?);
  let mut max_date: Option<NaiveDate> = None;
  let mut records: u64 = 0;
  let mut requests: u64 = 0;
  let mut current_label = String::new();

  while let Some(cur) = cursor {
    if cur.bucket.label() != current_label {
      current_label = cur.bucket.label();
      info!(stream = stream.name, bucket = %current_label, "syncing bucket");
    }

    let payload = build_payload(stream, &cur, cfg.site_id, cfg.filter_str.as_deref(), cfg.max_results);
    let rows = api
      .get_data(&payload)
      .with_context(|| format!("bucket {} page {}", cur.bucket.label(), cur.page))?;
    requests += 1;

    let row_count = rows.len();
    debug!(stream = stream.name, page = cur.page, rows = row_count, "page received");

    for row in rows {
      let record = post_process(row, stream)?;
      let date = record
        .get("date")
        .and_then(|v| v.as_str())
        .map(str_to_date)
        .transpose()
        .with_context(|| format!("replication key of a {} record", stream.name))?;
      if let Some(d) = date {
        max_date = Some(max_date.map_or(d, |m| m.max(d)));
      }
      emitter.record(stream.name, &record)?;
      records += 1;
    }

    cursor = cur.next(row_count, today)?;
  }

  if let Some(d) = max_date {
    state.advance(stream.name, d);
  }
  state.save()?;
  emitter.state(state)?;

  info!(stream = stream.name, records, requests, "stream complete");

  Ok((records, requests))
}
