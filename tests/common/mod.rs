use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One scripted HTTP response: status line suffix and JSON body.
pub struct Scripted {
  pub status: u16,
  pub body: String,
}

/// Everything the fixture server saw for one request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SeenRequest {
  pub api_key: Option<String>,
  pub payload: serde_json::Value,
}

/// A local stand-in for the getData endpoint. Replays the scripted responses
/// in order, then answers every further request with an empty-rows envelope,
/// and records each request's auth header and JSON payload.
#[allow(dead_code)]
pub struct FixtureApi {
  pub url: String,
  seen: Arc<Mutex<Vec<SeenRequest>>>,
}

#[allow(dead_code)]
impl FixtureApi {
  pub fn seen(&self) -> Vec<SeenRequest> {
    self.seen.lock().unwrap().clone()
  }
}

#[allow(dead_code)]
pub fn envelope(rows: serde_json::Value) -> String {
  serde_json::json!({"DataFeed": {"Rows": rows}}).to_string()
}

#[allow(dead_code)]
pub fn ok(rows: serde_json::Value) -> Scripted {
  Scripted { status: 200, body: envelope(rows) }
}

#[allow(dead_code)]
pub fn spawn_api(responses: Vec<Scripted>) -> FixtureApi {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let seen_srv = Arc::clone(&seen);

  // Detached accept loop; it dies with the test process.
  thread::spawn(move || {
    let mut responses = responses.into_iter();
    for stream in listener.incoming() {
      let Ok(stream) = stream else { break };
      let scripted = responses
        .next()
        .unwrap_or_else(|| ok(serde_json::json!([])));
      handle_request(stream, scripted, &seen_srv);
    }
  });

  FixtureApi {
    url: format!("http://{addr}"),
    seen,
  }
}

fn handle_request(stream: TcpStream, scripted: Scripted, seen: &Mutex<Vec<SeenRequest>>) {
  let mut reader = BufReader::new(stream);
  let mut content_length = 0usize;
  let mut api_key = None;

  loop {
    let mut line = String::new();
    if reader.read_line(&mut line).is_err() {
      return;
    }
    let line = line.trim_end();
    if line.is_empty() {
      break;
    }
    if let Some((name, value)) = line.split_once(':') {
      match name.to_ascii_lowercase().as_str() {
        "content-length" => content_length = value.trim().parse().unwrap_or(0),
        "x-api-key" => api_key = Some(value.trim().to_string()),
        _ => {}
      }
    }
  }

  let mut body = vec![0u8; content_length];
  if reader.read_exact(&mut body).is_err() {
    return;
  }
  if let Ok(payload) = serde_json::from_slice(&body) {
    seen.lock().unwrap().push(SeenRequest { api_key, payload });
  }

  let reason = match scripted.status {
    200 => "OK",
    400 => "Bad Request",
    403 => "Forbidden",
    503 => "Service Unavailable",
    _ => "Unknown",
  };
  let resp = format!(
    "HTTP/1.1 {} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
    scripted.status,
    scripted.body.len(),
    scripted.body,
  );
  let _ = reader.into_inner().write_all(resp.as_bytes());
}

/// Parse the binary's stdout into one JSON value per line.
#[allow(dead_code)]
pub fn messages(stdout: &[u8]) -> Vec<serde_json::Value> {
  std::str::from_utf8(stdout)
    .expect("utf-8 output")
    .lines()
    .map(|l| serde_json::from_str(l).expect("one JSON object per line"))
    .collect()
}
