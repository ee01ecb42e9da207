use anyhow::{Context, Result};
use std::io::Write;

use crate::record::Row;
use crate::state::State;
use crate::streams::StreamDef;

// Records leave the process as Singer-style JSON lines: one SCHEMA message
// per stream before its first record, RECORD per row, STATE after each
// completed stream. Logs go to stderr; this is the only writer on stdout.

pub struct Emitter<W: Write> {
  out: W,
}

impl<W: Write> Emitter<W> {
  pub fn new(out: W) -> Emitter<W> {
    Emitter { out }
  }

  fn write_message(&mut self, message: serde_json::Value) -> Result<()> {
    serde_json::to_writer(&mut self.out, &message)?;
    self.out.write_all(b"\n").context("writing message")?;
    Ok(())
  }

  pub fn schema(&mut self, stream: &StreamDef) -> Result<()> {
    self.write_message(serde_json::json!({
      "type": "SCHEMA",
      "stream": stream.name,
      "schema": stream.schema(),
      "key_properties": stream.primary_keys(),
      "bookmark_properties": [stream.replication_key],
    }))
  }

  pub fn record(&mut self, stream: &str, record: &Row) -> Result<()> {
    self.write_message(serde_json::json!({
      "type": "RECORD",
      "stream": stream,
      "record": record,
    }))
  }

  pub fn state(&mut self, state: &State) -> Result<()> {
    self.write_message(serde_json::json!({
      "type": "STATE",
      "value": state,
    }))
  }

  pub fn flush(&mut self) -> Result<()> {
    self.out.flush().context("flushing output")
  }

  #[cfg(test)]
  pub fn into_inner(self) -> W {
    self.out
  }
}

/// Resolve `--out`: "-" is stdout, anything else a file path.
pub fn open_output(out: &str) -> Result<Box<dyn Write>> {
  if out == "-" {
    return Ok(Box::new(std::io::stdout().lock()));
  }

  let file = std::fs::File::create(out).with_context(|| format!("creating output file {out}"))?;
  Ok(Box::new(std::io::BufWriter::new(file)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::streams;

  fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(buf)
      .unwrap()
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect()
  }

  #[test]
  fn messages_are_one_json_object_per_line() {
    let mut emitter = Emitter::new(Vec::new());
    let stream = streams::find("visits").unwrap();

    emitter.schema(stream).unwrap();
    let mut row = Row::new();
    row.insert("date".into(), "2021-01-30".into());
    row.insert("m_visits".into(), 7.into());
    emitter.record("visits", &row).unwrap();
    emitter.state(&State::default()).unwrap();
    emitter.flush().unwrap();

    let msgs = lines(&emitter.out);
    assert_eq!(msgs.len(), 3);
    assert_eq!(msgs[0]["type"], "SCHEMA");
    assert_eq!(msgs[0]["stream"], "visits");
    assert_eq!(msgs[0]["bookmark_properties"], serde_json::json!(["date"]));
    assert_eq!(msgs[1]["type"], "RECORD");
    assert_eq!(msgs[1]["record"]["m_visits"], 7);
    assert_eq!(msgs[2]["type"], "STATE");
    assert_eq!(msgs[2]["value"]["bookmarks"], serde_json::json!({}));
  }

  #[test]
  fn open_output_writes_to_file() {
    let td = tempfile::TempDir::new().unwrap();
    let path = td.path().join("out.jsonl");
    let out = path.to_string_lossy().to_string();

    {
      let mut w = open_output(&out).unwrap();
      w.write_all(b"{}\n").unwrap();
      w.flush().unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
  }
}
