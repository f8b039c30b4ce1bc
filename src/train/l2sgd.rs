//! Per-instance SGD with L2 regularization folded into the encoder's
//! `scale` parameter ("lazy" shrinkage), reshuffled every epoch.

use log::info;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::encoder::Encoder;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2SgdOptions {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_c2")]
    pub c2: f64,
    #[serde(default = "default_eta0")]
    pub eta0: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_epochs() -> usize {
    30
}

fn default_c2() -> f64 {
    1.0
}

fn default_eta0() -> f64 {
    0.1
}

fn default_seed() -> u64 {
    0xC4F1_D_5E7
}

impl Default for L2SgdOptions {
    fn default() -> Self {
        L2SgdOptions {
            epochs: default_epochs(),
            c2: default_c2(),
            eta0: default_eta0(),
            seed: default_seed(),
        }
    }
}

pub fn train(encoder: &mut Encoder, dataset: &Dataset, opts: &L2SgdOptions) -> Vec<f64> {
    let k = encoder.num_features();
    let mut w = vec![0.0; k];
    let mut rng = SmallRng::seed_from_u64(opts.seed);
    let mut order: Vec<usize> = (0..dataset.len()).collect();

    let mut t = 0u64;
    for epoch in 0..opts.epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0;

        for &idx in &order {
            let inst = dataset.get(idx);
            let eta = opts.eta0 / (1.0 + opts.eta0 * opts.c2 * t as f64);
            // Lazy L2 shrinkage folded into the weight scale passed to the
            // encoder, avoiding a dense pass over `w` every instance.
            let shrink = 1.0 - eta * opts.c2;

            encoder.set_weights(&w, shrink);
            encoder.set_instance(inst);
            let log_norm = encoder.partition_factor();
            let mut g = vec![0.0; k];
            let nll = encoder.objective_and_gradients(&mut g, 1.0, inst.weight);
            epoch_loss += nll;
            let _ = log_norm;

            for i in 0..k {
                w[i] = w[i] * shrink + eta * g[i];
            }
            t += 1;
        }

        info!("l2sgd: epoch {epoch}, loss = {epoch_loss:.6}");
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
        a.append(item.clone(), 0);

        let mut b = Instance::new(0);
        b.append(item.clone(), 1);
        b.append(item.clone(), 1);
        b.append(item, 1);

        Dataset::new(vec![a, b], 2, 1)
    }

    #[test]
    fn produces_finite_weights() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let opts = L2SgdOptions {
            epochs: 20,
            ..Default::default()
        };
        let w = train(&mut encoder, &ds, &opts);
        assert!(w.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn converges_on_a_separable_toy_problem() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let opts = L2SgdOptions {
            epochs: 200,
            c2: 0.01,
            eta0: 0.5,
            ..Default::default()
        };
        let w = train(&mut encoder, &ds, &opts);

        encoder.set_weights(&w, 1.0);
        for inst in ds.iter() {
            encoder.set_instance(inst);
            let mut path = Vec::new();
            encoder.viterbi(&mut path);
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();
            assert_eq!(path, gold);
        }
    }
}
