//! Batch L-BFGS, driving `Encoder::objective_and_gradients_batch` once per
//! iteration and adding L2 regularization on top.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::data::Dataset;
use crate::encoder::Encoder;
use crate::numeric::{vecaadd, vecdot, vecscale};

use super::StopCondition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbfgsOptions {
    #[serde(flatten)]
    pub stop: StopCondition,
    #[serde(default = "default_c2")]
    pub c2: f64,
    #[serde(default = "default_memory")]
    pub memory: usize,
}

fn default_c2() -> f64 {
    1.0
}

fn default_memory() -> usize {
    6
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        LbfgsOptions {
            stop: StopCondition::default(),
            c2: default_c2(),
            memory: default_memory(),
        }
    }
}

fn objective(encoder: &mut Encoder, dataset: &Dataset, w: &[f64], c2: f64, g: &mut [f64]) -> f64 {
    let mut f = encoder.objective_and_gradients_batch(dataset, w, g);
    // L2 regularization: f += c2/2 * |w|^2, g += c2 * w.
    f += 0.5 * c2 * vecdot(w, w);
    vecaadd(g, c2, w);
    f
}

/// Two-loop recursion limited-memory BFGS with a backtracking (Armijo)
/// line search. Stops after `max_iterations` or when the relative
/// improvement in the objective drops below `epsilon`.
pub fn train(encoder: &mut Encoder, dataset: &Dataset, opts: &LbfgsOptions) -> Vec<f64> {
    let k = encoder.num_features();
    let mut w = vec![0.0; k];
    let mut g = vec![0.0; k];
    let mut f = objective(encoder, dataset, &w, opts.c2, &mut g);

    let mut history: VecDeque<(Vec<f64>, Vec<f64>)> = VecDeque::with_capacity(opts.memory);
    let mut prev_f = f;

    for iteration in 0..opts.stop.max_iterations {
        // Two-loop recursion to compute the search direction.
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s, y) in history.iter().rev() {
            let rho = 1.0 / vecdot(y, s);
            let alpha = rho * vecdot(s, &q);
            vecaadd(&mut q, -alpha, y);
            alphas.push(alpha);
        }
        if let Some((s, y)) = history.back() {
            let gamma = vecdot(s, y) / vecdot(y, y);
            vecscale(&mut q, gamma);
        }
        for ((s, y), alpha) in history.iter().zip(alphas.iter().rev()) {
            let rho = 1.0 / vecdot(y, s);
            let beta = rho * vecdot(y, &q);
            vecaadd(&mut q, alpha - beta, s);
        }
        let direction: Vec<f64> = q.iter().map(|&v| -v).collect();

        // Backtracking line search on the Armijo condition.
        let directional_derivative = vecdot(&g, &direction);
        if directional_derivative >= 0.0 {
            info!("lbfgs: non-descent direction at iteration {iteration}, stopping");
            break;
        }
        let mut step = 1.0;
        let mut w_next = w.clone();
        let mut g_next = g.clone();
        let mut f_next;
        loop {
            w_next = w
                .iter()
                .zip(&direction)
                .map(|(&wi, &di)| wi + step * di)
                .collect();
            f_next = objective(encoder, dataset, &w_next, opts.c2, &mut g_next);
            if f_next <= f + 1e-4 * step * directional_derivative || step < 1e-12 {
                break;
            }
            step *= 0.5;
        }

        let s: Vec<f64> = w_next.iter().zip(&w).map(|(&a, &b)| a - b).collect();
        let y: Vec<f64> = g_next.iter().zip(&g).map(|(&a, &b)| a - b).collect();
        if vecdot(&y, &s) > 1e-10 {
            if history.len() == opts.memory {
                history.pop_front();
            }
            history.push_back((s, y));
        }

        w = w_next;
        g = g_next;
        prev_f = f;
        f = f_next;

        info!("lbfgs: iteration {iteration}, f = {f:.6}");

        let improvement = (prev_f - f).abs() / prev_f.abs().max(1.0);
        if improvement < opts.stop.epsilon {
            info!("lbfgs: converged after {iteration} iterations");
            break;
        }
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
    fn converges_on_a_separable_toy_problem() {
        let ds = binary_dataset();
        let mut encoder = Encoder::set_data(&ds, FeatureOptions::default());
        let opts = LbfgsOptions {
            stop: StopCondition {
                max_iterations: 50,
                epsilon: 1e-8,
            },
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
