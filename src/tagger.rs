//! A thin wrapper around a loaded `Model` and its `Encoder`, exposing the
//! tagging-time operations a CLI or library caller needs.

use crate::data::Instance;
use crate::encoder::Encoder;
use crate::model::Model;

pub struct Tagger {
    model: Model,
    encoder: Encoder,
}

impl Tagger {
    pub fn new(model: Model) -> Self {
        let mut encoder = Encoder::from_model_parts(
            model.num_labels(),
            model.num_attrs(),
            model.features.clone(),
            model.refs.clone(),
        );
        encoder.set_weights(&model.weights, 1.0);
        Tagger { model, encoder }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Decodes the single best label sequence for `inst`.
    pub fn tag(&mut self, inst: &Instance) -> (Vec<usize>, f64) {
        self.encoder.set_instance(inst);
        let mut path = Vec::new();
        let score = self.encoder.viterbi(&mut path);
        (path, score)
    }

    /// Decodes the best path and its normalized sequence probability
    /// `exp(score - log Z)`, requiring one extra forward/backward pass.
    pub fn tag_with_probability(&mut self, inst: &Instance) -> (Vec<usize>, f64) {
        self.encoder.set_instance(inst);
        let mut path = Vec::new();
        let score = self.encoder.viterbi(&mut path);
        let log_norm = self.encoder.partition_factor();
        (path, (score - log_norm).exp())
    }

    /// Per-position marginal probability of every label, requires the full
    /// forward-backward pass.
    pub fn marginals(&mut self, inst: &Instance) -> Vec<Vec<f64>> {
        self.encoder.set_instance(inst);
        self.encoder.partition_factor();
        self.encoder.marginals();

        (0..inst.len())
            .map(|t| {
                (0..self.model.num_labels())
                    .map(|l| self.encoder.marginal_state(t, l))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Dataset, Item};
    use crate::feature::FeatureOptions;
    use crate::Dictionary;

    fn toy_model() -> Model {
        let mut item = Item::new();
        item.push(Attribute::new(0, 1.0));
        let mut a = Instance::new(0);
        a.append(item.clone(), 0);
        a.append(item.clone(), 0);
        let mut b = Instance::new(0);
        b.append(item.clone(), 1);
        b.append(item, 1);
        let ds = Dataset::new(vec![a, b], 2, 1);

        let enc = Encoder::set_data(&ds, FeatureOptions::default());
        let w: Vec<f64> = (0..enc.num_features())
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();

        let mut attrs = Dictionary::new();
        attrs.get_or_intern("a1");
        let mut labels = Dictionary::new();
        labels.get_or_intern("L0");
        labels.get_or_intern("L1");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("m.bin");
        enc.save_model(&path, &w, &attrs, &labels).expect("save");
        Model::load(&path).expect("load")
    }

    #[test]
    fn tag_produces_a_path_of_the_right_length() {
        let model = toy_model();
        let mut tagger = Tagger::new(model);
        let mut item = Item::new();
        item.push(Attribute::new(0, 1.0));
        let mut inst = Instance::new(0);
        inst.append(item.clone(), 0);
        inst.append(item, 0);

        let (path, score) = tagger.tag(&inst);
        assert_eq!(path.len(), 2);
        assert!(score.is_finite());
    }
}
