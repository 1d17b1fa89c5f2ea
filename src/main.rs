//! Spring Explorer CLI entrypoint

use clap::Parser;

use explorer::cli::Cli;
use explorer::output;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
