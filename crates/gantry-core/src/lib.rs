pub mod backlog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod render;
pub mod sort;
pub mod task;
pub mod timeline;
pub mod vocab;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use coordinator::{
  EditOutcome,
  GanttState
};
pub use error::{
  ErrorKind,
  GanttError
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting gantry"
  );
  debug!(
    overrides = pre.rc_overrides.len(),
    "preprocessed rc overrides"
  );

  let mut cfg = config::Config::load(
    cli.gantryrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &cfg,
    &renderer,
    cli.command,
    cli.gantryrc.as_deref()
  )?;

  info!("done");
  Ok(())
}
