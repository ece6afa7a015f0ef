// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`     — fit preprocessing and train the autoencoder
//   2. `clean`     — reconstruct a dirty table
//   3. `anonymize` — encode a table into latent vectors

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AnonymizeArgs, CleanArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "auto-cleanse",
    version,
    about = "Train a tabular autoencoder, then clean or anonymize records with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case. Routing only, no computation.
    pub fn run(self) -> Result<()> {
        match &self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Clean(args)     => run_clean(args),
            Commands::Anonymize(args) => run_anonymize(args),
        }
    }
}

fn run_train(args: &TrainArgs) -> Result<()> {
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};
    use crate::infra::storage::open_store;
    use std::path::Path;

    tracing::info!("Starting training on '{}'", args.data);

    let config = TrainConfig::from(args);
    let store  = open_store(config.store, Path::new(&config.checkpoint_dir), args.remote.settings())?;
    let report = TrainUseCase::new(config, store).execute()?;

    let how = if report.stopped_early { "stopped early" } else { "ran full budget" };
    println!(
        "Training complete after {} epochs ({how}). Best validation loss {:.8}.",
        report.epochs_run, report.best_val_loss,
    );
    if let Some(test) = report.test {
        println!("Test loss {:.8} (CE {:.8}, MSE {:.8})", test.loss, test.ce, test.mse);
    }
    println!("Saved weights as {}", report.artifact);
    Ok(())
}

fn run_clean(args: &CleanArgs) -> Result<()> {
    use crate::application::clean_use_case::CleanUseCase;

    let report = CleanUseCase::new(args.into()).execute()?;
    if let Some(m) = report.metrics {
        println!("\nMAE: {:.8}", m.mae);
        println!("\nMSE: {:.8}", m.mse);
    }
    println!(
        "Cleaned {} of {} rows into '{}'",
        report.rows_out, report.rows_in, args.output.display(),
    );
    Ok(())
}

fn run_anonymize(args: &AnonymizeArgs) -> Result<()> {
    use crate::application::anonymize_use_case::AnonymizeUseCase;

    let report = AnonymizeUseCase::new(args.into()).execute()?;
    println!(
        "Encoded {} of {} rows into {}-dimensional vectors in '{}'",
        report.rows_out, report.rows_in, report.latent_width, args.output.display(),
    );
    if let Some(probe) = report.probe {
        println!(
            "Predicting '{}' ({} classes) from the latent vectors: accuracy {:.4} on {} rows",
            probe.target, probe.classes, probe.accuracy, probe.eval_rows,
        );
    }
    Ok(())
}
