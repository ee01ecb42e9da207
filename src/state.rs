use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::util::{date_to_str, str_to_date};

// Replication state is the single scalar each stream resumes from. The file
// shape mirrors the bookmark layout the surrounding ELT tooling expects:
// {"bookmarks": {"visits": {"date": "2021-01-30"}}}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
  pub date: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
  #[serde(default)]
  pub bookmarks: BTreeMap<String, Bookmark>,

  #[serde(skip)]
  path: Option<PathBuf>,
}

impl State {
  /// Load state from `path`, or start empty when no path is configured or
  /// the file does not exist yet. A present-but-unreadable file is an error;
  /// silently restarting from `start_date` would re-extract everything.
  pub fn load(path: Option<&Path>) -> Result<State> {
    let Some(path) = path else {
      return Ok(State::default());
    };

    if !path.exists() {
      return Ok(State {
        path: Some(path.to_path_buf()),
        ..State::default()
      });
    }

    let data = std::fs::read(path).with_context(|| format!("reading state file {}", path.display()))?;
    let mut state: State =
      serde_json::from_slice(&data).with_context(|| format!("parsing state file {}", path.display()))?;
    state.path = Some(path.to_path_buf());

    Ok(state)
  }

  /// The date a stream resumes from, when a bookmark exists. A malformed
  /// bookmark date is an error rather than a silent full re-sync.
  pub fn bookmark_date(&self, stream: &str) -> Result<Option<NaiveDate>> {
    match self.bookmarks.get(stream) {
      Some(b) => {
        let d = str_to_date(&b.date).with_context(|| format!("bookmark for stream {stream:?}"))?;
        Ok(Some(d))
      }
      None => Ok(None),
    }
  }

  /// Move a stream's bookmark forward. Never regresses: an older date than
  /// the current bookmark is ignored.
  pub fn advance(&mut self, stream: &str, date: NaiveDate) {
    let new = date_to_str(date);

    match self.bookmarks.get_mut(stream) {
      Some(b) if b.date >= new => {}
      Some(b) => b.date = new,
      None => {
        self.bookmarks.insert(stream.to_string(), Bookmark { date: new });
      }
    }
  }

  /// Persist to the configured path, atomically (write-then-rename), so an
  /// interrupted run never leaves a truncated state file. No-op without a
  /// configured path.
  pub fn save(&self) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };

    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(self)?;
    std::fs::write(&tmp, data).with_context(|| format!("writing state file {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing state file {}", path.display()))?;

    Ok(())
  }
}
