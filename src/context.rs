//! Per-instance dynamic programming: forward-backward with scaling, Viterbi,
//! and posterior marginals over a first-order linear chain.
//!
//! All matrices are flat, row-major buffers of size `T*L` (`state`, `alpha`,
//! `beta`, ...) or `L*L` (`trans`, ...). Bounds-checked row access is used
//! outside hot loops; hot loops slice a row once and index it directly.

use crate::numeric::{vecexp, vecscale, vecset, vecsum, vecsumlog};

fn row(buf: &[f64], l: usize, t: usize) -> &[f64] {
    &buf[t * l..(t + 1) * l]
}

/// Which matrices `reset` should zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    State,
    Trans,
    Both,
}

/// The dynamic-programming workspace for one instance.
///
/// `resize` grows the buffers to fit the largest instance seen so far and
/// never shrinks them, trading memory for avoiding per-instance allocation
/// in hot loops (see the design notes on the encoder's monotonic `resize`).
pub struct Context {
    l: usize,
    t: usize,
    cap_t: usize,

    pub state: Vec<f64>,
    pub trans: Vec<f64>,
    exp_state: Vec<f64>,
    exp_trans: Vec<f64>,

    alpha: Vec<f64>,
    beta: Vec<f64>,
    scale: Vec<f64>,
    back: Vec<usize>,

    mexp_state: Vec<f64>,
    mexp_trans: Vec<f64>,

    log_norm: f64,
}

impl Context {
    pub fn new(l: usize) -> Self {
        Context {
            l,
            t: 0,
            cap_t: 0,
            state: Vec::new(),
            trans: vec![0.0; l * l],
            exp_state: Vec::new(),
            exp_trans: vec![0.0; l * l],
            alpha: Vec::new(),
            beta: Vec::new(),
            scale: Vec::new(),
            back: Vec::new(),
            mexp_state: Vec::new(),
            mexp_trans: vec![0.0; l * l],
            log_norm: 0.0,
        }
    }

    pub fn num_labels(&self) -> usize {
        self.l
    }

    pub fn len(&self) -> usize {
        self.t
    }

    /// Grows the per-position buffers to hold `t` positions. Never shrinks.
    pub fn resize(&mut self, t: usize) {
        self.t = t;
        if t <= self.cap_t {
            return;
        }
        self.cap_t = t;
        let n = t * self.l;
        self.state.resize(n, 0.0);
        self.exp_state.resize(n, 0.0);
        self.alpha.resize(n, 0.0);
        self.beta.resize(n, 0.0);
        self.mexp_state.resize(n, 0.0);
        self.scale.resize(t, 0.0);
        self.back.resize(n, 0);
    }

    pub fn reset(&mut self, which: Reset) {
        let l = self.l;
        if which != Reset::Trans {
            let n = self.t * l;
            vecset(&mut self.state[..n], 0.0);
            vecset(&mut self.mexp_state[..n], 0.0);
        }
        if which != Reset::State {
            vecset(&mut self.trans, 0.0);
            vecset(&mut self.mexp_trans, 0.0);
        }
        self.log_norm = 0.0;
    }

    pub fn row<'a>(&self, buf: &'a [f64], t: usize) -> &'a [f64] {
        row(buf, self.l, t)
    }

    pub fn state_row(&self, t: usize) -> &[f64] {
        self.row(&self.state, t)
    }

    pub fn state_row_mut(&mut self, t: usize) -> &mut [f64] {
        let l = self.l;
        &mut self.state[t * l..(t + 1) * l]
    }

    pub fn trans_row(&self, i: usize) -> &[f64] {
        self.row(&self.trans, i)
    }

    pub fn trans_row_mut(&mut self, i: usize) -> &mut [f64] {
        let l = self.l;
        &mut self.trans[i * l..(i + 1) * l]
    }

    pub fn exp_state(&mut self) {
        let n = self.t * self.l;
        vecexp(&mut self.exp_state[..n], &self.state[..n]);
    }

    pub fn exp_transition(&mut self) {
        vecexp(&mut self.exp_trans, &self.trans);
    }

    /// Forward pass with per-column scaling. `scale[t]` is the reciprocal of
    /// the unscaled row sum (or `1` if that sum is `0`).
    pub fn alpha_score(&mut self) {
        let l = self.l;

        self.alpha[..l].copy_from_slice(&self.exp_state[..l]);
        let s0 = vecsum(&self.alpha[..l]);
        self.scale[0] = if s0 > 0.0 { 1.0 / s0 } else { 1.0 };
        vecscale(&mut self.alpha[..l], self.scale[0]);

        for t in 1..self.t {
            let prev: Vec<f64> = self.alpha[(t - 1) * l..t * l].to_vec();
            for j in 0..l {
                let mut acc = 0.0;
                for i in 0..l {
                    acc += prev[i] * self.exp_trans[i * l + j];
                }
                self.alpha[t * l + j] = acc * self.exp_state[t * l + j];
            }
            let s = vecsum(&self.alpha[t * l..(t + 1) * l]);
            self.scale[t] = if s > 0.0 { 1.0 / s } else { 1.0 };
            let sc = self.scale[t];
            vecscale(&mut self.alpha[t * l..(t + 1) * l], sc);
        }

        self.log_norm = -vecsumlog(&self.scale[..self.t]);
    }

    /// Backward pass, reusing the scale vector computed by `alpha_score`.
    pub fn beta_score(&mut self) {
        let l = self.l;
        let last = self.t - 1;
        let sc_last = self.scale[last];
        vecset(&mut self.beta[last * l..(last + 1) * l], sc_last);

        let mut t = last;
        while t > 0 {
            t -= 1;
            let row: Vec<f64> = (0..l)
                .map(|j| self.beta[(t + 1) * l + j] * self.exp_state[(t + 1) * l + j])
                .collect();
            for i in 0..l {
                let mut acc = 0.0;
                for j in 0..l {
                    acc += self.exp_trans[i * l + j] * row[j];
                }
                self.beta[t * l + i] = acc;
            }
            let sc = self.scale[t];
            vecscale(&mut self.beta[t * l..(t + 1) * l], sc);
        }
    }

    pub fn log_norm(&self) -> f64 {
        self.log_norm
    }

    /// Posterior probability of label `l` at position `t`.
    pub fn marginal_point(&self, label: usize, t: usize) -> f64 {
        self.alpha[t * self.l + label] * self.beta[t * self.l + label] / self.scale[t]
    }

    /// Posterior probability of `path[begin..end)`.
    pub fn marginal_path(&self, path: &[usize], begin: usize, end: usize) -> f64 {
        let l = self.l;
        if begin + 1 >= end {
            return self.marginal_point(path[begin], begin);
        }
        let a = path[begin];
        let z = path[end - 1];
        let mut prod = self.alpha[begin * l + a] * self.beta[(end - 1) * l + z] / self.scale[begin];
        for t in begin..end - 1 {
            let i = path[t];
            let j = path[t + 1];
            prod *= self.exp_trans[i * l + j] * self.exp_state[(t + 1) * l + j] * self.scale[t];
        }
        prod
    }

    /// Fills `mexp_state`/`mexp_trans` with posterior node and edge
    /// expectations. Requires `alpha_score`/`beta_score` to have run.
    pub fn marginals(&mut self) {
        let l = self.l;
        for t in 0..self.t {
            for j in 0..l {
                self.mexp_state[t * l + j] = self.marginal_point(j, t);
            }
        }
        vecset(&mut self.mexp_trans, 0.0);
        for t in 0..self.t.saturating_sub(1) {
            for i in 0..l {
                let a = self.alpha[t * l + i];
                if a == 0.0 {
                    continue;
                }
                for j in 0..l {
                    self.mexp_trans[i * l + j] +=
                        a * self.exp_trans[i * l + j] * self.exp_state[(t + 1) * l + j]
                            * self.beta[(t + 1) * l + j];
                }
            }
        }
    }

    pub fn mexp_state_at(&self, t: usize, l: usize) -> f64 {
        self.mexp_state[t * self.l + l]
    }

    pub fn mexp_trans_at(&self, i: usize, j: usize) -> f64 {
        self.mexp_trans[i * self.l + j]
    }

    /// Unnormalized log-score of a complete label path, using the
    /// un-exponentiated `state`/`trans` matrices.
    pub fn score(&self, path: &[usize]) -> f64 {
        let l = self.l;
        let mut s = self.state[path[0]];
        for t in 1..path.len() {
            let i = path[t - 1];
            let j = path[t];
            s += self.trans[i * l + j] + self.state[t * l + j];
        }
        s
    }

    /// Best-scoring label path, written into `out` (resized to `self.t`).
    /// Ties broken toward the lowest label index, matching the reference
    /// implementation's strict `<` comparison during backtrace.
    pub fn viterbi(&mut self, out: &mut Vec<usize>) -> f64 {
        let l = self.l;
        out.clear();
        out.resize(self.t, 0);

        let mut dp = self.row(&self.state, 0).to_vec();
        for t in 1..self.t {
            let mut next = vec![0.0; l];
            for j in 0..l {
                let mut best = f64::NEG_INFINITY;
                let mut best_i = 0usize;
                for i in 0..l {
                    let cand = dp[i] + self.trans[i * l + j];
                    if cand > best {
                        best = cand;
                        best_i = i;
                    }
                }
                next[j] = best + self.state[t * l + j];
                self.back[t * l + j] = best_i;
            }
            dp = next;
        }

        let mut best_score = dp[0];
        let mut best_last = 0usize;
        for j in 1..l {
            if dp[j] > best_score {
                best_score = dp[j];
                best_last = j;
            }
        }

        out[self.t - 1] = best_last;
        let mut t = self.t - 1;
        while t > 0 {
            let prev = self.back[t * l + out[t]];
            out[t - 1] = prev;
            t -= 1;
        }

        best_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ln(x: f64) -> f64 {
        x.ln()
    }

    /// Matches `crf1dc_debug_context()` from the reference implementation:
    /// L=3, T=3 with fixed state/transition scores.
    fn toy() -> Context {
        let mut ctx = Context::new(3);
        ctx.resize(3);
        let state = [
            [0.4_f64, 0.5, 0.1],
            [0.4, 0.1, 0.5],
            [0.4, 0.1, 0.5],
        ];
        let trans = [
            [0.3_f64, 0.1, 0.4],
            [0.6, 0.2, 0.1],
            [0.5, 0.2, 0.1],
        ];
        for t in 0..3 {
            for j in 0..3 {
                ctx.state[t * 3 + j] = ln(state[t][j]);
            }
        }
        for i in 0..3 {
            for j in 0..3 {
                ctx.trans[i * 3 + j] = ln(trans[i][j]);
            }
        }
        ctx.exp_state();
        ctx.exp_transition();
        ctx
    }

    fn brute_force_log_norm(ctx: &Context) -> f64 {
        let l = ctx.num_labels();
        let t = ctx.len();
        let mut total = 0.0;
        let mut path = vec![0usize; t];
        let total_paths = l.pow(t as u32);
        for code in 0..total_paths {
            let mut c = code;
            for p in path.iter_mut() {
                *p = c % l;
                c /= l;
            }
            total += ctx.score(&path).exp();
        }
        total.ln()
    }

    #[test]
    fn alpha_rows_sum_to_one() {
        let mut ctx = toy();
        ctx.alpha_score();
        for t in 0..3 {
            let s: f64 = ctx.row(&ctx.alpha, t).iter().sum();
            assert!((s - 1.0).abs() < 1e-9, "row {t} sums to {s}");
        }
    }

    #[test]
    fn log_norm_matches_brute_force() {
        let mut ctx = toy();
        ctx.alpha_score();
        let expected = brute_force_log_norm(&ctx);
        assert!((ctx.log_norm() - expected).abs() < 1e-6);
    }

    #[test]
    fn marginals_sum_to_one_and_match_brute_force() {
        let mut ctx = toy();
        ctx.alpha_score();
        ctx.beta_score();
        ctx.marginals();

        for t in 0..3 {
            let s: f64 = (0..3).map(|j| ctx.marginal_point(j, t)).sum();
            assert!((s - 1.0).abs() < 1e-9);
        }

        // Brute-force marginal of label 0 at t=0.
        let l: usize = 3;
        let t_len = 3;
        let mut num = 0.0;
        let mut den = 0.0;
        let mut path = vec![0usize; t_len];
        for code in 0..l.pow(t_len as u32) {
            let mut c = code;
            for p in path.iter_mut() {
                *p = c % l;
                c /= l;
            }
            let score = ctx.score(&path).exp();
            den += score;
            if path[0] == 0 {
                num += score;
            }
        }
        assert!((ctx.marginal_point(0, 0) - num / den).abs() < 1e-9);
    }

    #[test]
    fn viterbi_matches_exhaustive_max() {
        let mut ctx = toy();
        let mut path = Vec::new();
        let score = ctx.viterbi(&mut path);

        let l: usize = 3;
        let t_len = 3;
        let mut best = f64::NEG_INFINITY;
        let mut best_path = vec![0usize; t_len];
        let mut cand = vec![0usize; t_len];
        for code in 0..l.pow(t_len as u32) {
            let mut c = code;
            for p in cand.iter_mut() {
                *p = c % l;
                c /= l;
            }
            let s = ctx.score(&cand);
            if s > best {
                best = s;
                best_path = cand.clone();
            }
        }
        assert!((score - best).abs() < 1e-9);
        assert_eq!(path, best_path);
        assert_eq!(path, vec![0, 2, 2]);
    }

    #[test]
    fn scaling_safety_long_sequence() {
        let l = 10;
        let t_len = 200;
        let mut ctx = Context::new(l);
        ctx.resize(t_len);
        for t in 0..t_len {
            for j in 0..l {
                ctx.state[t * l + j] = 50.0 + (j as f64) * 0.1;
            }
        }
        for i in 0..l {
            for j in 0..l {
                ctx.trans[i * l + j] = if i == j { 1.0 } else { -1.0 };
            }
        }
        ctx.exp_state();
        ctx.exp_transition();
        ctx.alpha_score();
        ctx.beta_score();
        ctx.marginals();

        assert!(ctx.log_norm().is_finite());
        for t in 0..t_len {
            let s: f64 = (0..l).map(|j| ctx.marginal_point(j, t)).sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }
}
