use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};

use memsim::{Args, Config, Simulator, TraceSource};

const EXIT_OK: u8 = 0;
const EXIT_MISSING_INPUT: u8 = 2;
const EXIT_CONFIG_ERROR: u8 = 1;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.quiet {
        LevelFilter::Off
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    if !Path::new(&args.config).exists() {
        eprintln!("config file not found: {}", args.config);
        return ExitCode::from(EXIT_MISSING_INPUT);
    }
    if args.trace != "-" && !Path::new(&args.trace).exists() {
        eprintln!("trace file not found: {}", args.trace);
        return ExitCode::from(EXIT_MISSING_INPUT);
    }

    match run(&args) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::from_file(&args.config)?;
    info!("loaded config from {}", args.config);

    let mut simulator = Simulator::new(config)?;
    let trace = TraceSource::open(&args.trace, simulator.config().address_bits)?;
    simulator.simulate(trace)?;
    Ok(())
}
