use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::client::DEFAULT_BASE_URL;
use crate::util;

// The API caps a page at 10000 rows regardless of what we ask for.
const MAX_RESULTS_CAP: u32 = 10_000;
const DEFAULT_MAX_RESULTS: u32 = 5_000;

#[derive(Parser, Debug)]
#[command(
    name = "atinternet-activity-report",
    version,
    about = "Export AT Internet analytics to JSON record streams with incremental replication",
    long_about = None
)]
pub struct Cli {
  /// JSON config file carrying the same keys as the flags below; flags win
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// AT Internet API key
  #[arg(long, env = "ATINTERNET_API_KEY")]
  pub api_key: Option<String>,

  /// AT Internet secret key
  #[arg(long, env = "ATINTERNET_SECRET_KEY", hide_env_values = true)]
  pub secret_key: Option<String>,

  /// Site ID to query (see https://dataquery.atinternet-solutions.com/)
  #[arg(long)]
  pub site_id: Option<u64>,

  /// Start syncing data from that date (YYYY-MM-DD) when no bookmark exists
  #[arg(long)]
  pub start_date: Option<String>,

  /// Max rows per page, up to 10000
  #[arg(long)]
  pub max_results: Option<u32>,

  /// Only extract pages whose page_full_name contains this string
  #[arg(long)]
  pub filter: Option<String>,

  /// Stream to sync (repeatable; default: all streams)
  #[arg(long = "stream")]
  pub streams: Vec<String>,

  /// Replication state file, read at start and updated per completed stream
  #[arg(long)]
  pub state: Option<PathBuf>,

  /// Output location for emitted messages (default stdout "-")
  #[arg(long, default_value = "-")]
  pub out: String,

  /// Override the getData endpoint (hidden; tests only)
  #[arg(long, hide = true)]
  pub base_url: Option<String>,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override "today" for bucket cutoffs (hidden; tests only)
  #[arg(long = "now-override", hide = true)]
  pub now_override: Option<String>,
}

/// Config-file shape; the key names match the flags and the historical tap
/// configuration they came from.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
  pub api_key: Option<String>,
  pub secret_key: Option<String>,
  pub site_id: Option<u64>,
  pub start_date: Option<String>,
  pub max_results: Option<u32>,
  pub filter_str: Option<String>,
  #[serde(default)]
  pub streams: Vec<String>,
}

#[derive(Debug)]
pub struct EffectiveConfig {
  pub api_key: String,
  pub secret_key: String,
  pub site_id: u64,
  pub start_date: NaiveDate,
  pub max_results: u32,
  pub filter_str: Option<String>,
  pub streams: Vec<String>,
  pub state_path: Option<PathBuf>,
  pub out: String,
  pub base_url: String,
  pub now_override: Option<String>,
}

fn load_file_config(path: Option<&PathBuf>) -> Result<FileConfig> {
  let Some(path) = path else {
    return Ok(FileConfig::default());
  };

  let data = std::fs::read(path).with_context(|| format!("reading config file {}", path.display()))?;
  serde_json::from_slice(&data).with_context(|| format!("parsing config file {}", path.display()))
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let file = load_file_config(cli.config.as_ref())?;

  let api_key = match cli.api_key.or(file.api_key) {
    Some(k) if !k.trim().is_empty() => k,
    _ => bail!("missing api_key: pass --api-key, set ATINTERNET_API_KEY, or put it in --config"),
  };
  let secret_key = match cli.secret_key.or(file.secret_key) {
    Some(k) if !k.trim().is_empty() => k,
    _ => bail!("missing secret_key: pass --secret-key, set ATINTERNET_SECRET_KEY, or put it in --config"),
  };
  let site_id = match cli.site_id.or(file.site_id) {
    Some(id) => id,
    None => bail!("missing site_id: pass --site-id or put it in --config"),
  };
  let start_date = match cli.start_date.or(file.start_date) {
    Some(s) => util::str_to_date(&s).context("in start_date")?,
    None => bail!("missing start_date: pass --start-date or put it in --config"),
  };

  let max_results = cli.max_results.or(file.max_results).unwrap_or(DEFAULT_MAX_RESULTS);
  if max_results == 0 || max_results > MAX_RESULTS_CAP {
    bail!("max_results must be in 1..={MAX_RESULTS_CAP}, got {max_results}");
  }

  // empty filter string means no filtering
  let filter_str = cli.filter.or(file.filter_str).filter(|s| !s.is_empty());

  let streams = if cli.streams.is_empty() { file.streams } else { cli.streams };

  Ok(EffectiveConfig {
    api_key,
    secret_key,
    site_id,
    start_date,
    max_results,
    filter_str,
    streams,
    state_path: cli.state,
    out: cli.out,
    base_url: cli.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
    now_override: cli.now_override,
  })
}
