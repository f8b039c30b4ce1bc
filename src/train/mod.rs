//! Training algorithms consuming the encoder's objective/gradient contract.
//!
//! Every algorithm here runs on the calling thread and touches only the
//! `Encoder`'s public API (never `Context`/`Feature` internals), per the
//! single-threaded cooperative scheduling model.

pub mod arow;
pub mod averaged_perceptron;
pub mod l2sgd;
pub mod lbfgs;
pub mod passive_aggressive;

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::encoder::Encoder;
use crate::feature::FeatureOptions;

/// Shared stopping rule checked once per epoch/iteration by every
/// algorithm below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopCondition {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_max_iterations() -> usize {
    100
}

fn default_epsilon() -> f64 {
    1e-5
}

impl Default for StopCondition {
    fn default() -> Self {
        StopCondition {
            max_iterations: default_max_iterations(),
            epsilon: default_epsilon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum TrainOptions {
    Lbfgs(lbfgs::LbfgsOptions),
    L2Sgd(l2sgd::L2SgdOptions),
    AveragedPerceptron(averaged_perceptron::ApOptions),
    PassiveAggressive(passive_aggressive::PaOptions),
    Arow(arow::ArowOptions),
}

impl TrainOptions {
    pub fn name(&self) -> &'static str {
        match self {
            TrainOptions::Lbfgs(_) => "lbfgs",
            TrainOptions::L2Sgd(_) => "l2sgd",
            TrainOptions::AveragedPerceptron(_) => "averaged-perceptron",
            TrainOptions::PassiveAggressive(_) => "passive-aggressive",
            TrainOptions::Arow(_) => "arow",
        }
    }
}

pub struct TrainResult {
    pub weights: Vec<f64>,
    pub encoder: Encoder,
}

/// Builds the encoder for `dataset` and dispatches to the selected
/// algorithm, mirroring `tag_crfsuite_trainer::train()`'s algorithm switch.
pub fn train(dataset: &Dataset, feature_opts: FeatureOptions, options: &TrainOptions) -> TrainResult {
    let mut encoder = Encoder::set_data(dataset, feature_opts);
    let weights = match options {
        TrainOptions::Lbfgs(o) => lbfgs::train(&mut encoder, dataset, o),
        TrainOptions::L2Sgd(o) => l2sgd::train(&mut encoder, dataset, o),
        TrainOptions::AveragedPerceptron(o) => averaged_perceptron::train(&mut encoder, dataset, o),
        TrainOptions::PassiveAggressive(o) => passive_aggressive::train(&mut encoder, dataset, o),
        TrainOptions::Arow(o) => arow::train(&mut encoder, dataset, o),
    };
    TrainResult { weights, encoder }
}
