// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use clap::{Parser, Subcommand};
use detlog::{Config, Session, SpeedEstimator};
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;


#[derive(Parser)]
#[command(name = "detlog", version, about = "Inspect saved detector log sessions")]
struct Cli {
  /// YAML config; defaults apply when omitted.
  #[arg(long, global = true)]
  config:  Option<PathBuf>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
  /// List the channels of a session.
  Channels { session: PathBuf },
  /// Average speed over an upstream/downstream detector pair.
  Speed {
    session:    PathBuf,
    #[arg(long)]
    upstream:   u32,
    #[arg(long)]
    downstream: u32,
    /// Start of the time filter, in ms.
    #[arg(long, allow_negative_numbers = true, default_value_t = i64::MIN)]
    from:       i64,
    /// End of the time filter, in ms.
    #[arg(long, allow_negative_numbers = true, default_value_t = i64::MAX)]
    to:         i64,
  },
}


fn main() -> Result<()> {
  color_eyre::install()?;
  let filter = EnvFilter::try_from_default_env()
                 .unwrap_or_else(|_| EnvFilter::new("detlog=info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  let cli = Cli::parse();
  let config = match &cli.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };
  debug!(?config, "configuration");

  match cli.command {
    Command::Channels { session } => channels(&session),
    Command::Speed { session,
                     upstream,
                     downstream,
                     from,
                     to, } => {
      speed(&config, &session, upstream, downstream, from, to)
    }
  }
}

fn load(path: &Path) -> Result<Session> {
  Session::load(path).wrap_err_with(|| {
                       format!("unable to load session ({})", path.display())
                     })
}

fn channels(path: &Path) -> Result<()> {
  let session = load(path)?;
  if let Some(created) = session.created() {
    println!("session created {}", created.format("%Y-%m-%d %H:%M:%S"));
  }
  println!("{:>7} {:>5} {:>4} {:>8} {:>10} {:>10} {:>6}",
           "channel", "card", "pin", "records", "first", "last", "highs");
  for summary in session.registry().summary() {
    println!("{:>7} {:>5} {:>4} {:>8} {:>10} {:>10} {:>6}",
             summary.number(),
             summary.card(),
             summary.pin(),
             summary.records(),
             summary.first(),
             summary.last(),
             summary.high_states());
  }
  println!("{} groups", session.groups().len());
  Ok(())
}

fn speed(config: &Config,
         path: &Path,
         upstream: u32,
         downstream: u32,
         from: i64,
         to: i64)
         -> Result<()> {
  let session = load(path)?;
  let registry = session.registry();
  let estimator = SpeedEstimator::new(*config.speed());
  let report = estimator.report(registry.channel(upstream)?,
                                registry.channel(downstream)?,
                                from,
                                to);

  println!("{} matched, {} plausible, {} unmatched",
           report.samples().len(),
           report.plausible().count(),
           report.unmatched());
  println!("average speed {:.1}", report.mean());
  Ok(())
}
