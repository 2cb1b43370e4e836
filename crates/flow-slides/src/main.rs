mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8, quiet: bool, no_color: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = cli::Cli::parse();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }
    init_logging(cli.verbose, cli.quiet, cli.no_color);

    if let Err(err) = cli.run() {
        eprintln!("{} {err:#}", colored::Colorize::red("error:"));
        std::process::exit(1);
    }
}
