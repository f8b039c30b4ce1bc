//! Trains a linear-chain CRF from one or more item-wise annotated corpora.
//!
//! Each positional corpus file is assigned an increasing holdout group tag
//! (0, 1, 2, ...) in the order given; `--holdout` names the group to
//! withhold for evaluation instead of training on it.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use crf1d::corpus;
use crf1d::data::Dataset;
use crf1d::dict::Dictionary;
use crf1d::eval::Evaluation;
use crf1d::feature::FeatureOptions;
use crf1d::train::arow::ArowOptions;
use crf1d::train::averaged_perceptron::ApOptions;
use crf1d::train::l2sgd::L2SgdOptions;
use crf1d::train::lbfgs::LbfgsOptions;
use crf1d::train::passive_aggressive::{PaOptions, PaVariant};
use crf1d::train::{self, StopCondition, TrainOptions};

#[derive(Parser)]
#[command(name = "crf-train", about = "Trains a first-order linear-chain CRF")]
struct Cli {
    /// Item-wise annotated corpus files, one holdout group per file.
    corpora: Vec<PathBuf>,

    #[arg(short = 'm', long)]
    model: PathBuf,

    #[arg(short = 'e', long)]
    holdout: Option<i32>,

    #[arg(long, default_value_t = 0.0)]
    minfreq: f64,

    #[arg(long)]
    possible_states: bool,

    #[arg(long)]
    possible_transitions: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    algorithm: Option<Algorithm>,
}

#[derive(Subcommand)]
enum Algorithm {
    Lbfgs {
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
        #[arg(long, default_value_t = 1e-5)]
        epsilon: f64,
        #[arg(long, default_value_t = 1.0)]
        c2: f64,
        #[arg(long, default_value_t = 6)]
        memory: usize,
    },
    L2Sgd {
        #[arg(long, default_value_t = 30)]
        epochs: usize,
        #[arg(long, default_value_t = 1.0)]
        c2: f64,
        #[arg(long, default_value_t = 0.1)]
        eta0: f64,
    },
    AveragedPerceptron {
        #[arg(long, default_value_t = 30)]
        epochs: usize,
    },
    PassiveAggressive {
        #[arg(long, default_value_t = 30)]
        epochs: usize,
        #[arg(long, default_value_t = 1.0)]
        c: f64,
        /// "1" for PA-I (clipped) or "2" for PA-II (quadratic).
        #[arg(long, default_value = "1")]
        variant: String,
    },
    Arow {
        #[arg(long, default_value_t = 30)]
        epochs: usize,
        #[arg(long, default_value_t = 1.0)]
        gamma: f64,
    },
}

impl Algorithm {
    fn into_options(self) -> TrainOptions {
        match self {
            Algorithm::Lbfgs {
                max_iterations,
                epsilon,
                c2,
                memory,
            } => TrainOptions::Lbfgs(LbfgsOptions {
                stop: StopCondition {
                    max_iterations,
                    epsilon,
                },
                c2,
                memory,
            }),
            Algorithm::L2Sgd { epochs, c2, eta0 } => TrainOptions::L2Sgd(L2SgdOptions {
                epochs,
                c2,
                eta0,
                ..Default::default()
            }),
            Algorithm::AveragedPerceptron { epochs } => {
                TrainOptions::AveragedPerceptron(ApOptions { epochs })
            }
            Algorithm::PassiveAggressive { epochs, c, variant } => {
                let variant = match variant.as_str() {
                    "2" => PaVariant::Two,
                    _ => PaVariant::One,
                };
                TrainOptions::PassiveAggressive(PaOptions { epochs, c, variant })
            }
            Algorithm::Arow { epochs, gamma } => TrainOptions::Arow(ArowOptions { epochs, gamma }),
        }
    }
}

fn main() -> crf1d::Result<()> {
    let cli = Cli::parse();
    crf1d::init_logging(cli.log_file.as_deref());

    if cli.corpora.is_empty() {
        eprintln!("at least one corpus file is required");
        std::process::exit(2);
    }

    let mut labels = Dictionary::new();
    let mut attrs = Dictionary::new();
    let mut instances = Vec::new();
    for (group, path) in cli.corpora.iter().enumerate() {
        let reader = BufReader::new(File::open(path)?);
        let parsed = corpus::parse(reader, group as i32, &mut labels, &mut attrs)?;
        info!("read {} instances from {}", parsed.len(), path.display());
        instances.extend(parsed);
    }

    let dataset = Dataset::new(instances, labels.len(), attrs.len());
    let (train_set, holdout_set) = dataset.split_by_holdout(cli.holdout);
    info!(
        "{} training instances, {} holdout instances",
        train_set.len(),
        holdout_set.len()
    );

    let feature_opts = FeatureOptions {
        minfreq: cli.minfreq,
        possible_states: cli.possible_states,
        possible_transitions: cli.possible_transitions,
    };
    let options = cli
        .algorithm
        .unwrap_or(Algorithm::Lbfgs {
            max_iterations: 100,
            epsilon: 1e-5,
            c2: 1.0,
            memory: 6,
        })
        .into_options();

    info!("training with {} on {} instances", options.name(), train_set.len());
    let result = train::train(&train_set, feature_opts, &options);

    result.encoder.save_model(&cli.model, &result.weights, &attrs, &labels)?;
    info!("wrote model to {}", cli.model.display());

    if !holdout_set.is_empty() {
        let mut tagger = crf1d::Tagger::new(crf1d::Model::load(&cli.model)?);
        let mut eval = Evaluation::new(labels.len());
        for inst in holdout_set.iter() {
            let (predicted, _) = tagger.tag(inst);
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();
            eval.accumulate(&gold, &predicted);
        }
        info!(
            "holdout: item accuracy {:.4}, instance accuracy {:.4}, macro F1 {:.4}",
            eval.item_accuracy(),
            eval.instance_accuracy(),
            eval.macro_f1()
        );
    }

    Ok(())
}
