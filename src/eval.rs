//! Evaluation accumulator: per-label precision/recall/F1, macro averages,
//! item accuracy, and instance accuracy.
//!
//! Grounded in `holdout.cpp`'s `crfsuite_evaluation_*` calls, which log
//! exactly the six numbers this struct exposes after a holdout run.

#[derive(Debug, Clone)]
pub struct Evaluation {
    num_labels: usize,
    true_positive: Vec<u64>,
    false_positive: Vec<u64>,
    false_negative: Vec<u64>,
    item_total: u64,
    item_correct: u64,
    inst_total: u64,
    inst_correct: u64,
}

impl Evaluation {
    pub fn new(num_labels: usize) -> Self {
        Evaluation {
            num_labels,
            true_positive: vec![0; num_labels],
            false_positive: vec![0; num_labels],
            false_negative: vec![0; num_labels],
            item_total: 0,
            item_correct: 0,
            inst_total: 0,
            inst_correct: 0,
        }
    }

    /// Folds one `(gold, predicted)` label-sequence pair into the table.
    pub fn accumulate(&mut self, gold: &[usize], predicted: &[usize]) {
        assert_eq!(gold.len(), predicted.len());
        self.inst_total += 1;
        let mut instance_ok = true;

        for (&g, &p) in gold.iter().zip(predicted) {
            self.item_total += 1;
            if g == p {
                self.item_correct += 1;
                self.true_positive[g] += 1;
            } else {
                instance_ok = false;
                self.false_negative[g] += 1;
                self.false_positive[p] += 1;
            }
        }

        if instance_ok {
            self.inst_correct += 1;
        }
    }

    pub fn precision(&self, label: usize) -> f64 {
        let tp = self.true_positive[label] as f64;
        let fp = self.false_positive[label] as f64;
        if tp + fp == 0.0 {
            0.0
        } else {
            tp / (tp + fp)
        }
    }

    pub fn recall(&self, label: usize) -> f64 {
        let tp = self.true_positive[label] as f64;
        let fn_ = self.false_negative[label] as f64;
        if tp + fn_ == 0.0 {
            0.0
        } else {
            tp / (tp + fn_)
        }
    }

    pub fn f1(&self, label: usize) -> f64 {
        let p = self.precision(label);
        let r = self.recall(label);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn macro_precision(&self) -> f64 {
        self.average(|l| self.precision(l))
    }

    pub fn macro_recall(&self) -> f64 {
        self.average(|l| self.recall(l))
    }

    pub fn macro_f1(&self) -> f64 {
        self.average(|l| self.f1(l))
    }

    fn average(&self, f: impl Fn(usize) -> f64) -> f64 {
        if self.num_labels == 0 {
            0.0
        } else {
            (0..self.num_labels).map(f).sum::<f64>() / self.num_labels as f64
        }
    }

    pub fn item_accuracy(&self) -> f64 {
        if self.item_total == 0 {
            0.0
        } else {
            self.item_correct as f64 / self.item_total as f64
        }
    }

    pub fn instance_accuracy(&self) -> f64 {
        if self.inst_total == 0 {
            0.0
        } else {
            self.inst_correct as f64 / self.inst_total as f64
        }
    }

    pub fn item_total(&self) -> u64 {
        self.item_total
    }

    pub fn item_correct(&self) -> u64 {
        self.item_correct
    }

    pub fn instance_total(&self) -> u64 {
        self.inst_total
    }

    pub fn instance_correct(&self) -> u64 {
        self.inst_correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions_score_one() {
        let mut eval = Evaluation::new(2);
        eval.accumulate(&[0, 1, 0], &[0, 1, 0]);
        assert_eq!(eval.item_accuracy(), 1.0);
        assert_eq!(eval.instance_accuracy(), 1.0);
        assert_eq!(eval.macro_f1(), 1.0);
    }

    #[test]
    fn a_single_wrong_item_fails_the_whole_instance() {
        let mut eval = Evaluation::new(2);
        eval.accumulate(&[0, 1, 0], &[0, 0, 0]);
        assert!((eval.item_accuracy() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eval.instance_accuracy(), 0.0);
    }

    #[test]
    fn precision_recall_on_a_hand_built_confusion() {
        let mut eval = Evaluation::new(2);
        // label 0 predicted as 1 once (false negative for 0, false positive for 1).
        eval.accumulate(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert!((eval.precision(0) - 1.0).abs() < 1e-12);
        assert!((eval.recall(0) - 0.5).abs() < 1e-12);
        assert!((eval.precision(1) - 2.0 / 3.0).abs() < 1e-12);
        assert!((eval.recall(1) - 1.0).abs() < 1e-12);
    }
}
