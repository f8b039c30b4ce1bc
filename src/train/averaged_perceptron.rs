//! Averaged structured perceptron: Viterbi decode at INSTANCE level only,
//! additive update on mismatch, running average returned as the model.

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::encoder::Encoder;
use crate::numeric::vecadd;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApOptions {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
}

fn default_epochs() -> usize {
    30
}

impl Default for ApOptions {
    fn default() -> Self {
        ApOptions {
            epochs: default_epochs(),
        }
    }
}

pub fn train(encoder: &mut Encoder, dataset: &Dataset, opts: &ApOptions) -> Vec<f64> {
    let k = encoder.num_features();
    let mut w = vec![0.0; k];
    let mut total = vec![0.0; k];
    let mut updates = 0u64;

    for epoch in 0..opts.epochs {
        let mut mistakes = 0u64;
        encoder.set_weights(&w, 1.0);

        for inst in dataset.iter() {
            encoder.set_instance(inst);
            let mut predicted = Vec::new();
            encoder.viterbi(&mut predicted);
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();

            if predicted != gold {
                mistakes += 1;
                let mut delta = vec![0.0; k];
                encoder.features_on_path(inst, &gold, |fid, v| delta[fid as usize] += v);
                encoder.features_on_path(inst, &predicted, |fid, v| delta[fid as usize] -= v);
                vecadd(&mut w, &delta);
                encoder.set_weights(&w, 1.0);
            }

            vecadd(&mut total, &w);
            updates += 1;
        }

        info!("averaged-perceptron: epoch {epoch}, mistakes = {mistakes}");
    }

    if updates == 0 {
        return w;
    }
    total.iter().map(|&s| s / updates as f64).collect()
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
    fn learns_the_majority_label_per_attribute() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let w = train(&mut encoder, &ds, &ApOptions { epochs: 40 });

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
