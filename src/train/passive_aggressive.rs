//! Passive-aggressive online learning (PA-I / PA-II) for sequence labeling,
//! using Viterbi decode and a Hamming-distance margin.

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::encoder::Encoder;
use crate::numeric::vecaadd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaVariant {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaOptions {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_c")]
    pub c: f64,
    #[serde(default = "default_variant")]
    pub variant: PaVariant,
}

fn default_epochs() -> usize {
    30
}

fn default_c() -> f64 {
    1.0
}

fn default_variant() -> PaVariant {
    PaVariant::One
}

impl Default for PaOptions {
    fn default() -> Self {
        PaOptions {
            epochs: default_epochs(),
            c: default_c(),
            variant: default_variant(),
        }
    }
}

fn hamming(a: &[usize], b: &[u32]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(&x, &y)| x as u32 != y)
        .count() as f64
}

pub fn train(encoder: &mut Encoder, dataset: &Dataset, opts: &PaOptions) -> Vec<f64> {
    let k = encoder.num_features();
    let mut w = vec![0.0; k];

    for epoch in 0..opts.epochs {
        let mut total_loss = 0.0;
        encoder.set_weights(&w, 1.0);

        for inst in dataset.iter() {
            encoder.set_instance(inst);
            let mut predicted = Vec::new();
            encoder.viterbi(&mut predicted);
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();

            let delta_margin = hamming(&predicted, &inst.labels);
            let loss = (delta_margin - encoder.score(&gold) + encoder.score(&predicted)).max(0.0);

            if loss > 0.0 {
                let mut delta = vec![0.0; k];
                encoder.features_on_path(inst, &gold, |fid, v| delta[fid as usize] += v);
                encoder.features_on_path(inst, &predicted, |fid, v| delta[fid as usize] -= v);
                let norm2: f64 = delta.iter().map(|v| v * v).sum();

                if norm2 > 0.0 {
                    let tau = match opts.variant {
                        PaVariant::One => (loss / norm2).min(opts.c),
                        PaVariant::Two => loss / (norm2 + 1.0 / (2.0 * opts.c)),
                    };
                    vecaadd(&mut w, tau, &delta);
                    encoder.set_weights(&w, 1.0);
                }
            }

            total_loss += loss;
        }

        info!("passive-aggressive: epoch {epoch}, total hinge loss = {total_loss:.6}");
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
    fn reduces_hinge_loss_on_a_toy_problem() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let w = train(&mut encoder, &ds, &PaOptions::default());
        assert!(w.iter().all(|v| v.is_finite()));
    }
}
