use anyhow::Result;
use clap::Parser;

mod bucket;
mod cli;
mod client;
mod cursor;
mod emit;
mod record;
mod request;
mod state;
mod streams;
mod sync;
mod util;

use crate::cli::{normalize, Cli};
use crate::client::{HttpApi, RetryingApi};
use crate::emit::Emitter;
use crate::state::State;

fn main() -> Result<()> {
  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  // Records go to stdout (or --out); logs stay on stderr.
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  // Phase 1: normalize CLI and config file into one effective config
  let cfg = normalize(cli)?;

  // Phase 2: resolve the clock and replication state
  let today = util::effective_today(util::parse_now_override(cfg.now_override.as_deref()));
  let mut state = State::load(cfg.state_path.as_deref())?;

  // Phase 3: run the selected streams against the API
  let api = RetryingApi::new(HttpApi::new(&cfg.base_url, &cfg.api_key, &cfg.secret_key));
  let mut emitter = Emitter::new(emit::open_output(&cfg.out)?);
  sync::run_sync(&cfg, &api, &mut emitter, &mut state, today)?;

  Ok(())
}
