//! CLI route: dispatches parsed arguments to the inventory operations and
//! renders their output.

use crate::calculate::{calculate_tree, CalcOptions};
use crate::cli::parse::Cli;
use crate::compare::compare_trees;
use crate::duplicates::{find_duplicates, write_duplicates_csv};
use crate::hashing::StreamingMd5;
use crate::progress::ProgressObserver;
use crate::update::update_tree;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use tracing::info;

/// Execute the selected command.
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let hasher = StreamingMd5::new();

    if let Some(path) = &cli.calculate {
        let options = CalcOptions {
            continue_previous: cli.continue_previous,
            detail_files: cli.detail_files,
            parallel: cli.parallel,
            ..CalcOptions::default()
        };
        let mut bar = BarProgress::new();
        calculate_tree(path, cli.new, options, &hasher, &mut bar)?;
        bar.finish();
    } else if let Some([a, b]) = cli.compare.as_deref() {
        let report = compare_trees(a, b, cli.depth)?;
        println!("{report}");
    } else if let Some([source, destination]) = cli.update.as_deref() {
        let mut bar = BarProgress::new();
        update_tree(source, destination, cli.dry_run, &hasher, &mut bar)?;
        bar.finish();
    } else if let Some(path) = &cli.find_duplicates {
        let pairs = find_duplicates(path)?;
        let out = File::create("duplicates.csv")?;
        write_duplicates_csv(out, &pairs)?;
        info!("Duplicates list saved to duplicates.csv.");
    }
    Ok(())
}

/// Terminal progress bar fed by the engines' checkpoint callbacks.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} entries")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarProgress {
    fn on_progress(&mut self, done: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(done);
    }
}
