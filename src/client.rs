// === Module Header (agents-tooling) START ===
// purpose: HTTP transport for the getData endpoint: auth header, envelope decoding, retry, error classification
// role: transport/collaborator
// inputs: Payload values; base URL, api/secret keys
// outputs: Vec<Row> out of the DataFeed envelope, or a classified ApiError
// side_effects: network I/O; backoff sleeps; tracing to stderr
// invariants:
// - 4xx is fatal and carries the serialized request payload; 5xx and transport failures are retriable
// - RetryingApi callers never observe a retriable error before max_attempts is exhausted
// errors: ApiError {Client, Server, Transport, Malformed}; the sync loop matches on retriability only here
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::Row;
use crate::request::Payload;

pub const DEFAULT_BASE_URL: &str = "https://api.atinternet.io/v3/data/getData";

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport error taxonomy the sync loop relies on: client errors abort a
/// stream, server and transport errors are retried here before the cursor
/// ever observes a response.
#[derive(Debug, Error)]
pub enum ApiError {
  /// 4xx. Fatal; carries the request payload so a rejected query can be
  /// diagnosed without replaying it.
  #[error("{status} Client Error: {reason}. Request payload: {payload}")]
  Client { status: u16, reason: String, payload: String },

  /// 5xx. Retriable.
  #[error("{status} Server Error: {reason}")]
  Server { status: u16, reason: String },

  /// Connection-level failure before an HTTP status was obtained. Retriable.
  #[error("transport error: {0}")]
  Transport(String),

  /// A 2xx response whose body is not the expected envelope. Fatal.
  #[error("malformed response: {0}")]
  Malformed(String),
}

impl ApiError {
  pub fn is_retriable(&self) -> bool {
    matches!(self, ApiError::Server { .. } | ApiError::Transport(_))
  }
}

/// Seam between the sync loop and the wire. The loop only ever needs the
/// rows back; everything status-shaped is folded into `ApiError`.
pub trait DataApi {
  fn get_data(&self, payload: &Payload) -> Result<Vec<Row>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(rename = "DataFeed")]
  data_feed: DataFeed,
}

#[derive(Debug, Deserialize)]
struct DataFeed {
  #[serde(rename = "Rows")]
  rows: Vec<Row>,
}

pub struct HttpApi {
  agent: ureq::Agent,
  url: String,
  api_key_header: String,
}

impl HttpApi {
  /// The API authenticates with a single header combining both keys.
  pub fn new(base_url: &str, api_key: &str, secret_key: &str) -> HttpApi {
    let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();

    HttpApi {
      agent,
      url: base_url.to_string(),
      api_key_header: format!("{api_key}_{secret_key}"),
    }
  }
}

impl DataApi for HttpApi {
  fn get_data(&self, payload: &Payload) -> Result<Vec<Row>, ApiError> {
    let resp = self
      .agent
      .post(&self.url)
      .set("x-api-key", &self.api_key_header)
      .set("Content-type", "application/json")
      .send_json(payload);

    match resp {
      Ok(r) => {
        let envelope: Envelope = r
          .into_json()
          .map_err(|e| ApiError::Malformed(format!("decoding DataFeed envelope: {e}")))?;
        Ok(envelope.data_feed.rows)
      }
      Err(ureq::Error::Status(status, r)) if (400..500).contains(&status) => Err(ApiError::Client {
        status,
        reason: r.status_text().to_string(),
        payload: serde_json::to_string(payload).unwrap_or_else(|_| "<unserializable>".into()),
      }),
      Err(ureq::Error::Status(status, r)) => Err(ApiError::Server {
        status,
        reason: r.status_text().to_string(),
      }),
      Err(ureq::Error::Transport(t)) => Err(ApiError::Transport(t.to_string())),
    }
  }
}

/// Wrapper adding bounded retry with exponential backoff for retriable
/// errors. Fatal errors pass through on the first occurrence.
pub struct RetryingApi<A> {
  inner: A,
  max_attempts: u32,
  base_backoff: Duration,
}

impl<A> RetryingApi<A> {
  pub fn new(inner: A) -> RetryingApi<A> {
    RetryingApi {
      inner,
      max_attempts: MAX_ATTEMPTS,
      base_backoff: BASE_BACKOFF,
    }
  }

  #[cfg(test)]
  fn with_backoff(inner: A, max_attempts: u32, base_backoff: Duration) -> RetryingApi<A> {
    RetryingApi {
      inner,
      max_attempts,
      base_backoff,
    }
  }
}

impl<A: DataApi> DataApi for RetryingApi<A> {
  fn get_data(&self, payload: &Payload) -> Result<Vec<Row>, ApiError> {
    let mut attempt = 1;

    loop {
      match self.inner.get_data(payload) {
        Ok(rows) => {
          debug!(rows = rows.len(), page = payload.page_num, "page fetched");
          return Ok(rows);
        }
        Err(e) if e.is_retriable() && attempt < self.max_attempts => {
          let delay = self.base_backoff * 2u32.saturating_pow(attempt - 1);
          warn!(attempt, max = self.max_attempts, error = %e, "retriable API error, backing off");
          std::thread::sleep(delay);
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
