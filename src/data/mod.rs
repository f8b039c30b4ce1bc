//! The corpus-agnostic data model: attributes, items, instances, datasets.

/// One (attribute id, real value) pair attached to an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute {
    pub id: u32,
    pub value: f64,
}

impl Attribute {
    pub fn new(id: u32, value: f64) -> Self {
        Attribute { id, value }
    }
}

/// A single position in a sequence: an unordered bag of weighted attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub contents: Vec<Attribute>,
}

impl Item {
    pub fn new() -> Self {
        Item::default()
    }

    pub fn push(&mut self, attr: Attribute) {
        self.contents.push(attr);
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// A labeled sequence: items, their gold labels, an instance weight, and a
/// holdout group tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub items: Vec<Item>,
    pub labels: Vec<u32>,
    pub weight: f64,
    pub group: i32,
}

impl Instance {
    pub fn new(group: i32) -> Self {
        Instance {
            items: Vec::new(),
            labels: Vec::new(),
            weight: 1.0,
            group,
        }
    }

    pub fn append(&mut self, item: Item, label: u32) {
        self.items.push(item);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An ordered collection of instances over a fixed label/attribute space.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub instances: Vec<Instance>,
    num_labels: usize,
    num_attributes: usize,
}

impl Dataset {
    pub fn new(instances: Vec<Instance>, num_labels: usize, num_attributes: usize) -> Self {
        Dataset {
            instances,
            num_labels,
            num_attributes,
        }
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_attributes(&self) -> usize {
        self.num_attributes
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, i: usize) -> &Instance {
        &self.instances[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// Splits the dataset into (training, holdout) by group tag, matching
    /// the behavior of the trainer's holdout-group selection: every
    /// instance ends up in exactly one half.
    pub fn split_by_holdout(&self, holdout_group: Option<i32>) -> (Dataset, Dataset) {
        match holdout_group {
            None => (
                Dataset::new(self.instances.clone(), self.num_labels, self.num_attributes),
                Dataset::new(Vec::new(), self.num_labels, self.num_attributes),
            ),
            Some(g) => {
                let (holdout, train): (Vec<_>, Vec<_>) =
                    self.instances.iter().cloned().partition(|inst| inst.group == g);
                (
                    Dataset::new(train, self.num_labels, self.num_attributes),
                    Dataset::new(holdout, self.num_labels, self.num_attributes),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_instance(group: i32) -> Instance {
        let mut inst = Instance::new(group);
        inst.append(Item::new(), 0);
        inst
    }

    #[test]
    fn holdout_split_is_exhaustive_and_disjoint() {
        let ds = Dataset::new(
            vec![toy_instance(0), toy_instance(1), toy_instance(0), toy_instance(2)],
            2,
            0,
        );
        let (train, holdout) = ds.split_by_holdout(Some(0));
        assert_eq!(train.len() + holdout.len(), ds.len());
        assert!(holdout.instances.iter().all(|i| i.group == 0));
        assert!(train.instances.iter().all(|i| i.group != 0));
    }

    #[test]
    fn no_holdout_group_keeps_everything_in_train() {
        let ds = Dataset::new(vec![toy_instance(0), toy_instance(1)], 2, 0);
        let (train, holdout) = ds.split_by_holdout(None);
        assert_eq!(train.len(), ds.len());
        assert!(holdout.is_empty());
    }
}
