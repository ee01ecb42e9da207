// === Module Header (agents-tooling) START ===
// purpose: Pagination state machine over time buckets for the getData endpoint
// role: domain/state-machine
// inputs: Granularity, replication start date, effective today, per-response row counts
// outputs: PageCursor values describing the next request, or None when the stream is done
// side_effects: none (pure given today)
// invariants:
// - successive cursors either increment the page under the same window or advance one bucket at page 1
// - a daily cursor never targets today or later; a monthly cursor may target the current partial month
// errors: a start date with no complete data behind it yet is a configuration error
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{bail, Result};
use chrono::NaiveDate;

use crate::bucket::{Bucket, Granularity, TimeWindow};
use crate::util::date_to_str;

/// What to fetch next: a time bucket, its query window, and a page number.
///
/// The API caps rows per call and does not report reliable totals, so a full
/// extraction walks buckets in order and pages through each one until an
/// empty page signals exhaustion. Cursors are replaced, never mutated: for
/// any two successive cursors either the page increments under the same
/// window, or the bucket advances to the immediately following one with the
/// page reset to 1.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PageCursor {
  pub bucket: Bucket,
  pub window: TimeWindow,
  pub page: u32,
}

impl PageCursor {
  /// Seed the first request of a stream from its replication starting value.
  ///
  /// Daily streams query exactly that day. Monthly streams query from that
  /// day to the end of its month, so a mid-month bookmark does not re-fetch
  /// the whole month. A daily start at or past today, or a monthly start in
  /// a fully future month, is a configuration error: the seed bucket must
  /// have complete data behind it, same as the cutoff `next` applies.
  pub fn initial(granularity: Granularity, start: NaiveDate, today: NaiveDate) -> Result<PageCursor> {
    let bucket = Bucket::seed(granularity, start);

    if bucket.is_future(today) {
      bail!(
        "start date {} has no complete data to sync yet (today is {})",
        date_to_str(start),
        date_to_str(today)
      );
    }
    let window = bucket.bounds(today, Some(start))?;

    Ok(PageCursor { bucket, window, page: 1 })
  }

  /// Compute the cursor for the request after this one, given how many rows
  /// the response to this one carried.
  ///
  /// A non-empty page means the bucket may have more pages: same window,
  /// next page. An empty page (including an empty first page) means the
  /// bucket is exhausted: move to the next bucket at page 1, or stop when
  /// that bucket would reach into the future. Pure apart from `today`, so
  /// replaying the same transition always yields the same cursor.
  pub fn next(&self, rows: usize, today: NaiveDate) -> Result<Option<PageCursor>> {
    if rows > 0 {
      return Ok(Some(PageCursor {
        bucket: self.bucket,
        window: self.window,
        page: self.page + 1,
      }));
    }

    let next_bucket = self.bucket.advance();

    if next_bucket.is_future(today) {
      return Ok(None);
    }

    Ok(Some(PageCursor {
      bucket: next_bucket,
      window: next_bucket.bounds(today, None)?,
      page: 1,
    }))
  }
}
