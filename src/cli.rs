use clap::Parser;

/// Command-line front end: config file, trace source, and verbosity flags.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the memory hierarchy config file.
    #[arg(short, long)]
    pub config: String,

    /// Path to the trace file, or "-" to read the trace from stdin.
    #[arg(short, long)]
    pub trace: String,

    /// Raise logging to debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress this crate's own log records (the simulation's own
    /// per-access and statistics output is unaffected).
    #[arg(short, long)]
    pub quiet: bool,
}
