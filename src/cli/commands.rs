// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `prepare`, `inspect` and
// `schedule`, and all their configurable flags.
//
// Task type, mask scheme and split are parsed through their
// FromStr impls, so a bad value is rejected by clap before any
// file is touched.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::inspect_use_case::InspectConfig;
use crate::application::prepare_use_case::PrepareConfig;
use crate::domain::split::SplitKind;
use crate::domain::symbols::{MaskScheme, TaskType};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the preparation pipeline and write the artifacts
    Prepare(PrepareArgs),

    /// Load prepared artifacts and batch one split
    Inspect(InspectArgs),

    /// Print the warm-up learning-rate schedule as CSV
    Schedule(ScheduleArgs),
}

/// All arguments for the `prepare` command.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Dataset name; selects the number transfer (math23k, hmwp, ...)
    #[arg(long, default_value = "math23k")]
    pub dataset: String,

    /// Directory holding trainset.json / validset.json / testset.json
    #[arg(long, default_value = "dataset/math23k")]
    pub dataset_dir: String,

    /// Where vocab.json, the prepared splits and tokenizer.json go
    #[arg(long, default_value = "prepared/math23k")]
    pub output_dir: String,

    /// single_equation or multi_equation
    #[arg(long, default_value = "single_equation")]
    pub task_type: TaskType,

    /// NUM, number or alphabet
    #[arg(long, default_value = "NUM")]
    pub mask_symbol: MaskScheme,

    /// Keep words seen more often than this in training
    #[arg(long, default_value_t = 1)]
    pub min_word_keep: usize,

    /// Generate equation constants seen at least this often
    #[arg(long, default_value_t = 5)]
    pub min_generate_keep: usize,

    /// Input and output share one vocabulary
    #[arg(long)]
    pub share_vocab: bool,

    /// Size the sequence vocabulary with the cross-split copy count
    #[arg(long)]
    pub symbol_for_tree: bool,

    /// Annotation cache stem inside the dataset directory; omit to skip annotation
    #[arg(long)]
    pub parse_tree_file: Option<String>,

    /// Rebuild the annotation cache even if it exists
    #[arg(long)]
    pub rebuild: bool,

    /// Language handed to the annotator as {lang}
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Command printing CoNLL-U for a sentence read from stdin
    #[arg(long)]
    pub annotator_cmd: Option<String>,

    /// Only warn about training symbols without an output index
    #[arg(long)]
    pub lenient_symbols: bool,
}

/// Convert CLI PrepareArgs into the application-layer PrepareConfig.
impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            dataset:           a.dataset,
            dataset_dir:       a.dataset_dir,
            output_dir:        a.output_dir,
            task_type:         a.task_type,
            mask_symbol:       a.mask_symbol,
            min_word_keep:     a.min_word_keep,
            min_generate_keep: a.min_generate_keep,
            share_vocab:       a.share_vocab,
            symbol_for_tree:   a.symbol_for_tree,
            parse_tree_file:   a.parse_tree_file,
            rebuild:           a.rebuild,
            language:          a.language,
            annotator_cmd:     a.annotator_cmd,
            strict_symbols:    !a.lenient_symbols,
        }
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory written by `prepare`
    #[arg(long, default_value = "prepared/math23k")]
    pub output_dir: String,

    /// train, valid or test
    #[arg(long, default_value = "train")]
    pub split: SplitKind,

    /// Number of samples to batch
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Also run an untrained RNN-VAE over the batch
    #[arg(long)]
    pub vae: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig {
            output_dir: a.output_dir,
            split:      a.split,
            batch_size: a.batch_size,
            vae:        a.vae,
            seed:       a.seed,
        }
    }
}

/// All arguments for the `schedule` command
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[arg(long, default_value_t = 1.0)]
    pub init_lr: f64,

    /// Model width the rate is scaled by
    #[arg(long, default_value_t = 512)]
    pub d_model: usize,

    #[arg(long, default_value_t = 4000)]
    pub warmup_steps: usize,

    /// Number of steps to print
    #[arg(long, default_value_t = 10000)]
    pub steps: usize,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_prepare_args_become_config() {
        let cli = Cli::try_parse_from([
            "mwp-toolkit", "prepare",
            "--dataset", "hmwp",
            "--task-type", "multi_equation",
            "--mask-symbol", "alphabet",
            "--parse-tree-file", "deprel_tree_info",
            "--lenient-symbols",
        ])
        .unwrap();

        let Commands::Prepare(args) = cli.command else { panic!("expected prepare") };
        let cfg = PrepareConfig::from(args);
        assert_eq!(cfg.dataset, "hmwp");
        assert_eq!(cfg.task_type, TaskType::MultiEquation);
        assert_eq!(cfg.mask_symbol, MaskScheme::Alphabet);
        assert_eq!(cfg.parse_tree_file.as_deref(), Some("deprel_tree_info"));
        assert!(!cfg.strict_symbols);
    }

    #[test]
    fn test_unknown_mask_scheme_is_rejected_by_clap() {
        let parsed = Cli::try_parse_from(["mwp-toolkit", "prepare", "--mask-symbol", "roman"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_inspect_split_parses() {
        let cli = Cli::try_parse_from(["mwp-toolkit", "inspect", "--split", "valid", "--vae"]).unwrap();
        let Commands::Inspect(args) = cli.command else { panic!("expected inspect") };
        let cfg = InspectConfig::from(args);
        assert_eq!(cfg.split, SplitKind::Valid);
        assert!(cfg.vae);
    }
}
