//! Adaptive regularization of weights (AROW): a diagonal approximation of
//! the per-feature confidence (inverse-variance) matrix scales each update
//! and is itself shrunk after every mistake.

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::encoder::Encoder;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArowOptions {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

fn default_epochs() -> usize {
    30
}

fn default_gamma() -> f64 {
    1.0
}

impl Default for ArowOptions {
    fn default() -> Self {
        ArowOptions {
            epochs: default_epochs(),
            gamma: default_gamma(),
        }
    }
}

fn hamming(a: &[usize], b: &[u32]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(&x, &y)| x as u32 != y)
        .count() as f64
}

pub fn train(encoder: &mut Encoder, dataset: &Dataset, opts: &ArowOptions) -> Vec<f64> {
    let k = encoder.num_features();
    let mut w = vec![0.0; k];
    let mut sigma = vec![1.0; k];

    for epoch in 0..opts.epochs {
        let mut mistakes = 0u64;
        encoder.set_weights(&w, 1.0);

        for inst in dataset.iter() {
            encoder.set_instance(inst);
            let mut predicted = Vec::new();
            encoder.viterbi(&mut predicted);
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();

            let margin = hamming(&predicted, &inst.labels);
            let loss = (margin - encoder.score(&gold) + encoder.score(&predicted)).max(0.0);

            if loss > 0.0 {
                mistakes += 1;
                let mut delta = vec![0.0; k];
                encoder.features_on_path(inst, &gold, |fid, v| delta[fid as usize] += v);
                encoder.features_on_path(inst, &predicted, |fid, v| delta[fid as usize] -= v);

                let confidence: f64 = delta.iter().zip(&sigma).map(|(&d, &s)| d * d * s).sum();
                let beta = 1.0 / (confidence + opts.gamma);
                let alpha = loss * beta;

                for i in 0..k {
                    if delta[i] != 0.0 {
                        w[i] += alpha * sigma[i] * delta[i];
                        sigma[i] -= beta * (sigma[i] * delta[i]).powi(2);
                    }
                }
                encoder.set_weights(&w, 1.0);
            }
        }

        info!("arow: epoch {epoch}, mistakes = {mistakes}");
    }

    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Instance, Item};
    use crate::feature::FeatureOptions;

    fn binary_dataset() -> Dataset {
        let mut item = Item::new();
        item.push(Attribute::new(0, 1.0));

        let mut a = Instance::new(0);
        a.append(item.clone(), 0);
        a.append(item.clone(), 0);

        let mut b = Instance::new(0);
        b.append(item.clone(), 1);
        b.append(item, 1);

        Dataset::new(vec![a, b], 2, 1)
    }

    #[test]
    fn keeps_confidence_bounded_and_weights_finite() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let w = train(&mut encoder, &ds, &ArowOptions::default());
        assert!(w.iter().all(|v| v.is_finite()));
    }
}
