// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `prepare`  — corpus → masked, normalised, annotated
//                   splits + vocabularies on disk
//   2. `inspect`  — load a prepared dataset and batch a split
//   3. `schedule` — print the warm-up learning-rate curve
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, PrepareArgs, ScheduleArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mwp-toolkit",
    version = "0.1.0",
    about = "Prepare math word problem corpora: number masking, equation forms, annotation and vocabularies."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case; nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args)  => run_prepare(args),
            Commands::Inspect(args)  => run_inspect(args),
            Commands::Schedule(args) => run_schedule(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let use_case = PrepareUseCase::new(args.into());
    let dataset  = use_case.execute()?;

    let vocab = &dataset.vocab;
    println!(
        "Prepared '{}': {} train / {} valid / {} test records",
        dataset.dataset,
        dataset.splits.train.len(),
        dataset.splits.valid.len(),
        dataset.splits.test.len(),
    );
    println!(
        "  input words {}, pos tags {}, tree symbols {}, sequence symbols {}",
        vocab.input_words.len(),
        vocab.input_pos.len(),
        vocab.tree_symbols.len(),
        vocab.seq_symbols.len(),
    );
    println!("  artifacts written to '{}'", use_case.config().output_dir);
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let report = InspectUseCase::new(args.into()).execute()?;

    println!("{} split of '{}': {} samples", report.split, report.dataset, report.samples);
    for (name, dims) in &report.shapes {
        println!("  {:<20} {:?}", name, dims);
    }
    println!("\nFirst sample '{}'", report.first_id);
    println!("  question: {}", report.first_question.join(" "));
    println!("  sequence: {}", report.first_infix.join(" "));
    println!("  tree:     {}", report.first_prefix.join(" "));
    if let Some(vae) = &report.vae {
        println!("\nUntrained RNN-VAE: NLL {:.3}, KL {:.3}", vae.nll, vae.kl);
    }
    Ok(())
}

fn run_schedule(args: ScheduleArgs) -> Result<()> {
    use crate::ml::scheduler::WarmUpScheduler;

    let mut scheduler = WarmUpScheduler::new(args.init_lr, args.d_model, args.warmup_steps);
    println!("step,lr");
    for (step, lr) in scheduler.schedule(args.steps).into_iter().enumerate() {
        println!("{},{:.8}", step + 1, lr);
    }
    Ok(())
}
