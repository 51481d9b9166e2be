//! Semilla CLI — application bootstrap assembly.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "semilla",
    version,
    about = "Application bootstrap assembly — resolves recipe chains into self-contained boot scripts"
)]
struct Cli {
    #[command(subcommand)]
    command: semilla::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = semilla::cli::dispatch(cli.command) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
