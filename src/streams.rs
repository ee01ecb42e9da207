use anyhow::{bail, Result};

use crate::bucket::Granularity;

// Stream definitions are configuration values, not subtypes: each one is a
// row in this table, and everything downstream (request columns, output
// schema, primary key) is derived from it. Metric and property order is
// meaningful; it defines the API query's column order and the schema order.

#[derive(Debug)]
pub struct StreamDef {
  pub name: &'static str,
  pub granularity: Granularity,
  pub replication_key: &'static str,
  pub metrics: &'static [&'static str],
  pub properties: &'static [&'static str],
}

pub static STREAMS: &[StreamDef] = &[
  StreamDef {
    name: "visits",
    granularity: Granularity::Daily,
    replication_key: "date",
    metrics: &["m_visits"],
    properties: &["date", "geo_city", "geo_country", "geo_region", "page_full_name"],
  },
  StreamDef {
    name: "hourly_visits",
    granularity: Granularity::Daily,
    replication_key: "date",
    metrics: &["m_visits"],
    properties: &["date", "visit_hour", "page_full_name"],
  },
  StreamDef {
    name: "page_views",
    granularity: Granularity::Daily,
    replication_key: "date",
    metrics: &["m_page_loads"],
    properties: &["date", "page_full_name"],
  },
  StreamDef {
    name: "devices",
    granularity: Granularity::Monthly,
    replication_key: "date",
    metrics: &["m_visits"],
    properties: &["date_year", "date_month", "device_type", "os_group"],
  },
  StreamDef {
    name: "traffic_sources",
    granularity: Granularity::Monthly,
    replication_key: "date",
    metrics: &["m_visits"],
    properties: &["date_year", "date_month", "src_type"],
  },
];

impl StreamDef {
  /// Column list for the API query: metrics first, then properties, in
  /// declared order.
  pub fn columns(&self) -> Vec<String> {
    self
      .metrics
      .iter()
      .chain(self.properties.iter())
      .map(|s| s.to_string())
      .collect()
  }

  /// Composite primary key of the emitted records. Monthly streams carry a
  /// synthesized `date` column that is part of the key too.
  pub fn primary_keys(&self) -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = self.metrics.iter().chain(self.properties.iter()).copied().collect();

    if !keys.contains(&"date") {
      keys.push("date");
    }
    keys
  }

  /// JSON schema for the records this stream emits.
  pub fn schema(&self) -> serde_json::Value {
    let mut props = serde_json::Map::new();

    for key in self.primary_keys() {
      props.insert(key.to_string(), column_schema(key));
    }

    serde_json::json!({
      "type": "object",
      "properties": props,
      "required": self.primary_keys(),
      "additionalProperties": false,
    })
  }
}

fn column_schema(name: &str) -> serde_json::Value {
  if name == "date" {
    return serde_json::json!({"type": "string", "format": "date"});
  }
  // visit_hour is post-processed to an integer sentinel when the API says N/A
  if name == "visit_hour" || name == "date_year" || name.starts_with("m_") {
    return serde_json::json!({"type": "integer"});
  }
  serde_json::json!({"type": "string"})
}

pub fn find(name: &str) -> Option<&'static StreamDef> {
  STREAMS.iter().find(|s| s.name == name)
}

/// Resolve the configured stream selection; empty means all streams.
pub fn select(names: &[String]) -> Result<Vec<&'static StreamDef>> {
  if names.is_empty() {
    return Ok(STREAMS.iter().collect());
  }

  let mut out = Vec::with_capacity(names.len());

  for name in names {
    match find(name) {
      Some(s) => out.push(s),
      None => {
        let known: Vec<&str> = STREAMS.iter().map(|s| s.name).collect();
        bail!("unknown stream {name:?}; known streams: {}", known.join(", "));
      }
    }
  }
  Ok(out)
}
