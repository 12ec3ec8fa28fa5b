//! treesum CLI binary.

use clap::Parser;
use std::process;
use tracing::error;
use treesum::cli::{run, Cli};
use treesum::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        error!("Command failed: {e}");
        eprintln!("{e}");
        process::exit(1);
    }
}
