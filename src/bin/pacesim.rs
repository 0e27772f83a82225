use anyhow::Context;
use clap::Parser;
use pacesim::{logger, prelude::*};
use std::path::PathBuf;

/// Runs a paced traffic scenario.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The scenario file. Runs the built-in star scenario if absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the directory trace files are written to.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Overrides the seed of the simulation RNG.
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides the stop time, in seconds.
    #[arg(long)]
    stop_time: Option<f64>,

    /// Suppresses the runtime banners.
    #[arg(short, long)]
    quiet: bool,

    /// Prints the effective scenario as YAML instead of running it.
    #[arg(long)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::try_init().context("failed to initialize logging")?;

    let mut config = match &args.config {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::star(),
    };

    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(stop_time) = args.stop_time {
        config.stop_time = SimTime::try_from_secs_f64(stop_time)
            .with_context(|| format!("invalid stop time {stop_time}"))?;
    }

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let mut builder = config.builder();
    if args.quiet {
        builder = builder.quiet();
    }

    let report = Scenario::run(config, builder).context("scenario failed")?;
    print!("{report}");
    Ok(())
}
