mod app;
mod cli;
mod commands;
mod output;
mod types;
mod util;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Exit codes: 0 results found, 1 no matches, 2 usage or filter syntax
/// error, 3 snapshot I/O or corruption.
fn main() {
    // RUST_LOG drives verbosity; decode warnings show up at `warn`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = cli::Cli::parse();
    let code = match app::run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            3
        }
    };
    std::process::exit(code);
}
