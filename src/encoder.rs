//! Mediates between a generic optimizer loop and the inference core.
//!
//! The encoder owns the feature model and a single `Context`, and exposes
//! a small API whose calls must be made in a monotonically increasing
//! "level" order (`NONE -> WEIGHT -> INSTANCE -> ALPHABETA -> MARGINAL`).
//! Regressing the level is a programmer error and panics, matching the
//! reference implementation's internal-logic failure class.

use std::path::Path;

use log::info;

use crate::context::{Context, Reset};
use crate::data::{Dataset, Instance};
use crate::dict::Dictionary;
use crate::feature::{self, Feature, FeatureKind, FeatureOptions, FeatureRefs, BOS};
use crate::model::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    None = 0,
    Weight = 1,
    Instance = 2,
    AlphaBeta = 3,
    Marginal = 4,
}

pub struct Encoder {
    num_labels: usize,
    num_attrs: usize,
    features: Vec<Feature>,
    refs: FeatureRefs,
    ctx: Context,
    level: Level,
    weights: Vec<f64>,
    scale: f64,
    current: Option<Instance>,
}

impl Encoder {
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, fid: u32) -> &Feature {
        &self.features[fid as usize]
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn refs(&self) -> &FeatureRefs {
        &self.refs
    }

    /// Builds the feature model for `dataset` and sizes the inference
    /// context to its longest instance.
    pub fn set_data(dataset: &Dataset, opts: FeatureOptions) -> Self {
        let (features, refs) = feature::generate(dataset, opts);
        let k = features.len();
        info!("generated {k} features from {} instances", dataset.len());

        let max_t = dataset.iter().map(Instance::len).max().unwrap_or(0);
        let mut ctx = Context::new(dataset.num_labels());
        if max_t > 0 {
            ctx.resize(max_t);
        }

        Encoder {
            num_labels: dataset.num_labels(),
            num_attrs: dataset.num_attributes(),
            features,
            refs,
            ctx,
            level: Level::None,
            weights: vec![0.0; k],
            scale: 1.0,
            current: None,
        }
    }

    /// Builds an encoder directly from a loaded model's feature set and
    /// reference lists, bypassing dataset-driven generation. Used by
    /// `Tagger`.
    pub fn from_model_parts(
        num_labels: usize,
        num_attrs: usize,
        features: Vec<Feature>,
        refs: FeatureRefs,
    ) -> Self {
        let k = features.len();
        Encoder {
            num_labels,
            num_attrs,
            features,
            refs,
            ctx: Context::new(num_labels),
            level: Level::None,
            weights: vec![0.0; k],
            scale: 1.0,
            current: None,
        }
    }

    fn require(&self, min: Level) {
        assert!(
            self.level >= min,
            "encoder level {:?} does not satisfy required level {:?}",
            self.level,
            min
        );
    }

    /// Stores `w`/`scale` and recomputes `trans` from the Transition
    /// features. Level -> WEIGHT.
    pub fn set_weights(&mut self, w: &[f64], scale: f64) {
        assert_eq!(w.len(), self.features.len());
        self.weights.copy_from_slice(w);
        self.scale = scale;

        self.ctx.reset(Reset::Trans);
        for (fid, f) in self.features.iter().enumerate() {
            if f.kind == FeatureKind::Transition {
                self.ctx.trans_row_mut(f.src as usize)[f.dst as usize] = w[fid] * scale;
            }
        }
        self.level = Level::Weight;
        self.current = None;
    }

    /// Fills `state` for `inst` from the currently stored weights. Requires
    /// WEIGHT. Level -> INSTANCE.
    pub fn set_instance(&mut self, inst: &Instance) {
        self.require(Level::Weight);
        assert!(!inst.is_empty(), "cannot set a zero-length instance");

        self.ctx.resize(inst.len());
        self.ctx.reset(Reset::State);

        for (t, item) in inst.items.iter().enumerate() {
            for attr in &item.contents {
                if let Some(fids) = self.refs.attr_refs.get(attr.id as usize) {
                    for &fid in fids {
                        let f = &self.features[fid as usize];
                        self.ctx.state_row_mut(t)[f.dst as usize] +=
                            self.weights[fid as usize] * attr.value * self.scale;
                    }
                }
            }
        }

        self.current = Some(inst.clone());
        self.level = Level::Instance;
    }

    pub fn score(&self, path: &[usize]) -> f64 {
        self.require(Level::Instance);
        self.ctx.score(path)
    }

    pub fn viterbi(&mut self, out: &mut Vec<usize>) -> f64 {
        self.require(Level::Instance);
        self.ctx.viterbi(out)
    }

    /// Runs forward/backward. Requires INSTANCE. Level -> ALPHABETA.
    pub fn partition_factor(&mut self) -> f64 {
        self.require(Level::Instance);
        self.ctx.exp_state();
        self.ctx.exp_transition();
        self.ctx.alpha_score();
        self.ctx.beta_score();
        self.level = Level::AlphaBeta;
        self.ctx.log_norm()
    }

    /// Enumerates the `(fid, value)` pairs fired by `(inst, path)`, in
    /// position order: transition into `t` (for `t>0`) then state features
    /// at `t`.
    pub fn features_on_path(&self, inst: &Instance, path: &[usize], mut callback: impl FnMut(u32, f64)) {
        for (t, item) in inst.items.iter().enumerate() {
            if t > 0 {
                let prev = path[t - 1];
                if let Some(fids) = self.refs.label_refs.get(prev) {
                    for &fid in fids {
                        if self.features[fid as usize].dst as usize == path[t] {
                            callback(fid, 1.0);
                            break;
                        }
                    }
                }
            }
            for attr in &item.contents {
                if let Some(fids) = self.refs.attr_refs.get(attr.id as usize) {
                    for &fid in fids {
                        if self.features[fid as usize].dst as usize == path[t] {
                            callback(fid, attr.value);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Fills the posterior marginal buffers from the current alpha/beta
    /// pass, without touching a gradient accumulator. Requires ALPHABETA.
    /// Level -> MARGINAL.
    pub fn marginals(&mut self) {
        self.require(Level::AlphaBeta);
        self.ctx.marginals();
        self.level = Level::Marginal;
    }

    pub fn marginal_state(&self, t: usize, label: usize) -> f64 {
        self.require(Level::Marginal);
        self.ctx.mexp_state_at(t, label)
    }

    pub fn marginal_transition(&self, i: usize, j: usize) -> f64 {
        self.require(Level::Marginal);
        self.ctx.mexp_trans_at(i, j)
    }

    /// Accumulates the gradient contribution of the current instance into
    /// `g`, advancing to MARGINAL, and returns
    /// `(-score(gold) + log_norm) * weight`.
    pub fn objective_and_gradients(&mut self, g: &mut [f64], gain: f64, weight: f64) -> f64 {
        self.require(Level::AlphaBeta);
        self.ctx.marginals();
        self.level = Level::Marginal;

        let inst = self.current.clone().expect("instance must be set");
        let w_eff = gain * weight;

        // Empirical (observed) expectation along the gold path.
        let gold = inst.labels.iter().map(|&l| l as usize).collect::<Vec<_>>();
        self.features_on_path(&inst, &gold, |fid, v| {
            g[fid as usize] += w_eff * v;
        });

        // Model expectation, subtracted.
        for (t, item) in inst.items.iter().enumerate() {
            for attr in &item.contents {
                if let Some(fids) = self.refs.attr_refs.get(attr.id as usize) {
                    for &fid in fids {
                        let dst = self.features[fid as usize].dst as usize;
                        g[fid as usize] -= w_eff * attr.value * self.ctx.mexp_state_at(t, dst);
                    }
                }
            }
        }
        for i in 0..self.num_labels {
            if let Some(fids) = self.refs.label_refs.get(i) {
                for &fid in fids {
                    let j = self.features[fid as usize].dst as usize;
                    g[fid as usize] -= w_eff * self.ctx.mexp_trans_at(i, j);
                }
            }
        }

        let score = self.score(&gold);
        (-score + self.ctx.log_norm()) * weight
    }

    /// The batch objective/gradient used by L-BFGS: initializes `g` from
    /// negated observation frequencies, computes `trans` from `w` once,
    /// then folds every instance's contribution in.
    pub fn objective_and_gradients_batch(&mut self, dataset: &Dataset, w: &[f64], g: &mut [f64]) -> f64 {
        assert_eq!(w.len(), self.features.len());
        assert_eq!(g.len(), self.features.len());

        for (fid, f) in self.features.iter().enumerate() {
            g[fid] = -f.freq;
        }

        self.set_weights(w, 1.0);

        let mut logl = 0.0;
        for inst in dataset.iter() {
            self.set_instance(inst);
            self.partition_factor();
            self.ctx.marginals();
            self.level = Level::Marginal;

            let gold = inst.labels.iter().map(|&l| l as usize).collect::<Vec<_>>();
            let score = self.ctx.score(&gold);
            logl += (score - self.ctx.log_norm()) * inst.weight;

            for (t, item) in inst.items.iter().enumerate() {
                for attr in &item.contents {
                    if let Some(fids) = self.refs.attr_refs.get(attr.id as usize) {
                        for &fid in fids {
                            let dst = self.features[fid as usize].dst as usize;
                            g[fid as usize] +=
                                inst.weight * attr.value * self.ctx.mexp_state_at(t, dst);
                        }
                    }
                }
            }
            for i in 0..self.num_labels {
                if let Some(fids) = self.refs.label_refs.get(i) {
                    for &fid in fids {
                        let j = self.features[fid as usize].dst as usize;
                        g[fid as usize] += inst.weight * self.ctx.mexp_trans_at(i, j);
                    }
                }
            }
        }

        -logl
    }

    pub fn save_model(
        &self,
        path: &Path,
        w: &[f64],
        attrs: &Dictionary,
        labels: &Dictionary,
    ) -> Result<(), ModelError> {
        crate::model::writer::write_model(path, &self.features, w, attrs, labels)
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_attrs(&self) -> usize {
        self.num_attrs
    }
}

/// Also re-exported so callers do not need to reach into `feature::BOS`
/// unless they are hand-building an instance's label sequence.
pub const BEGIN_OF_SEQUENCE: u32 = BOS;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Item};

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
    fn level_progression_is_enforced() {
        let ds = binary_dataset();
        let mut enc = Encoder::set_data(&ds, FeatureOptions::default());
        let w = vec![0.0; enc.num_features()];
        enc.set_weights(&w, 1.0);
        enc.set_instance(ds.get(0));
        let _ = enc.partition_factor();
    }

    #[test]
    #[should_panic]
    fn instance_before_weight_panics() {
        let ds = binary_dataset();
        let mut enc = Encoder::set_data(&ds, FeatureOptions::default());
        enc.set_instance(ds.get(0));
    }

    #[test]
    fn batch_objective_is_finite_and_gradient_matches_feature_count() {
        let ds = binary_dataset();
        let mut enc = Encoder::set_data(&ds, FeatureOptions::default());
        let w = vec![0.1; enc.num_features()];
        let mut g = vec![0.0; enc.num_features()];
        let f = enc.objective_and_gradients_batch(&ds, &w, &mut g);
        assert!(f.is_finite());
        assert!(g.iter().all(|v| v.is_finite()));
    }
}
