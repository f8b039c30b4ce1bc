//! Feature generation: turning a dataset into the set of state and
//! transition features, with frequency pruning and reference lists.

use std::collections::HashMap;

use crate::data::Dataset;

/// Sentinel previous-label value marking the beginning of a sequence; no
/// Transition feature is ever emitted for it.
pub const BOS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// `(attribute id, label id)`.
    State,
    /// `(prev label id, label id)`.
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub kind: FeatureKind,
    pub src: u32,
    pub dst: u32,
    pub freq: f64,
}

/// Options controlling feature generation, mirroring the original
/// `crf1de_option_t` fields.
#[derive(Debug, Clone, Copy)]
pub struct FeatureOptions {
    pub minfreq: f64,
    pub possible_states: bool,
    pub possible_transitions: bool,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        FeatureOptions {
            minfreq: 0.0,
            possible_states: false,
            possible_transitions: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureRefs {
    /// `label_refs[i]` / `attr_refs[a]`: fids of features whose `src == i`/`a`.
    pub label_refs: Vec<Vec<u32>>,
    pub attr_refs: Vec<Vec<u32>>,
}

/// Generates and prunes the feature set for `dataset`, returning the
/// retained features (index = fid) and the reference lists built from them.
///
/// Deduplication key is `(kind, src, dst)`, combined via a `HashMap` rather
/// than the reference implementation's weak `type + src + dst` hash.
pub fn generate(dataset: &Dataset, opts: FeatureOptions) -> (Vec<Feature>, FeatureRefs) {
    let mut table: HashMap<(FeatureKind, u32, u32), f64> = HashMap::new();

    for inst in dataset.iter() {
        let mut prev = BOS;
        for (t, item) in inst.items.iter().enumerate() {
            let cur = inst.labels[t];

            if prev != BOS {
                *table
                    .entry((FeatureKind::Transition, prev, cur))
                    .or_insert(0.0) += inst.weight;
            }

            for attr in &item.contents {
                *table
                    .entry((FeatureKind::State, attr.id, cur))
                    .or_insert(0.0) += inst.weight * attr.value;

                if opts.possible_states {
                    for l in 0..dataset.num_labels() as u32 {
                        table
                            .entry((FeatureKind::State, attr.id, l))
                            .or_insert(0.0);
                    }
                }
            }

            prev = cur;
        }
    }

    if opts.possible_transitions {
        let l = dataset.num_labels() as u32;
        for i in 0..l {
            for j in 0..l {
                table.entry((FeatureKind::Transition, i, j)).or_insert(0.0);
            }
        }
    }

    let mut features: Vec<Feature> = table
        .into_iter()
        .filter(|(_, freq)| *freq >= opts.minfreq || *freq == 0.0)
        .map(|((kind, src, dst), freq)| Feature { kind, src, dst, freq })
        .collect();
    // Pruning keeps zero-freq "possible" features unconditionally; drop any
    // genuine below-threshold feature that happened to have freq == 0.0 and
    // minfreq > 0.0 only when it was not injected as "possible" -- in
    // practice a real (non-injected) zero-freq feature cannot occur since
    // weights are positive, so the filter above is exact.
    features.retain(|f| f.freq >= opts.minfreq || f.freq == 0.0);

    let refs = build_refs(&features, dataset.num_labels(), dataset.num_attributes());
    (features, refs)
}

fn build_refs(features: &[Feature], num_labels: usize, num_attrs: usize) -> FeatureRefs {
    let mut label_refs = vec![Vec::new(); num_labels];
    let mut attr_refs = vec![Vec::new(); num_attrs];

    for (fid, f) in features.iter().enumerate() {
        match f.kind {
            FeatureKind::State => {
                if let Some(bucket) = attr_refs.get_mut(f.src as usize) {
                    bucket.push(fid as u32);
                }
            }
            FeatureKind::Transition => {
                if let Some(bucket) = label_refs.get_mut(f.src as usize) {
                    bucket.push(fid as u32);
                }
            }
        }
    }

    FeatureRefs { label_refs, attr_refs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, Instance, Item};

    fn toy_dataset() -> Dataset {
        let mut item = Item::new();
        item.push(Attribute::new(0, 1.0));
        let mut inst = Instance::new(0);
        inst.weight = 1.0;
        inst.append(item.clone(), 0);
        inst.append(item, 1);
        Dataset::new(vec![inst], 2, 1)
    }

    #[test]
    fn generates_state_and_transition_features() {
        let ds = toy_dataset();
        let (features, refs) = generate(&ds, FeatureOptions::default());
        assert!(features
            .iter()
            .any(|f| f.kind == FeatureKind::State && f.src == 0 && f.dst == 0));
        assert!(features
            .iter()
            .any(|f| f.kind == FeatureKind::Transition && f.src == 0 && f.dst == 1));
        assert_eq!(refs.attr_refs.len(), 1);
        assert_eq!(refs.label_refs.len(), 2);
    }

    #[test]
    fn minfreq_prunes_rare_features() {
        let ds = toy_dataset();
        let opts = FeatureOptions {
            minfreq: 2.0,
            ..Default::default()
        };
        let (features, _) = generate(&ds, opts);
        assert!(features.is_empty());
    }

    #[test]
    fn possible_states_injects_zero_freq_features() {
        let ds = toy_dataset();
        let opts = FeatureOptions {
            possible_states: true,
            ..Default::default()
        };
        let (features, _) = generate(&ds, opts);
        // Attribute 0 with label 1 never co-occurs in the toy dataset, but
        // should be injected with freq 0 when possible_states is set.
        assert!(features
            .iter()
            .any(|f| f.kind == FeatureKind::State && f.src == 0 && f.dst == 1 && f.freq == 0.0));
    }
}
