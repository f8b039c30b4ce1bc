//! In-place dense vector kernels shared by the inference context and the encoder.
//!
//! Every matrix in this crate (`state[T][L]`, `trans[L][L]`, ...) is a flat,
//! row-major buffer. These kernels operate on single rows (`&mut [F]` /
//! `&[F]`) so the context never allocates inside a hot loop.

use num_traits::Float;

/// Sum of a row.
pub fn vecsum<F: Float>(x: &[F]) -> F {
    x.iter().fold(F::zero(), |acc, &v| acc + v)
}

/// `x *= a` elementwise.
pub fn vecscale<F: Float>(x: &mut [F], a: F) {
    for v in x.iter_mut() {
        *v = *v * a;
    }
}

/// `y += x` elementwise. Panics if the slices differ in length.
pub fn vecadd<F: Float>(y: &mut [F], x: &[F]) {
    assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + xi;
    }
}

/// `y += a * x` elementwise (scaled accumulate).
pub fn vecaadd<F: Float>(y: &mut [F], a: F, x: &[F]) {
    assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + a * xi;
    }
}

/// `y *= x` elementwise.
pub fn vecmul<F: Float>(y: &mut [F], x: &[F]) {
    assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi * xi;
    }
}

/// Dot product.
pub fn vecdot<F: Float>(x: &[F], y: &[F]) -> F {
    assert_eq!(x.len(), y.len());
    x.iter().zip(y).fold(F::zero(), |acc, (&a, &b)| acc + a * b)
}

/// `y = exp(x)` elementwise.
pub fn vecexp<F: Float>(y: &mut [F], x: &[F]) {
    assert_eq!(y.len(), x.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = xi.exp();
    }
}

/// `x = value` elementwise.
pub fn vecset<F: Float>(x: &mut [F], value: F) {
    for v in x.iter_mut() {
        *v = value;
    }
}

/// Sum of `log(x_i)` over a row, used to reassemble `log_norm` from the
/// per-position scale factors.
pub fn vecsumlog<F: Float>(x: &[F]) -> F {
    x.iter().fold(F::zero(), |acc, &v| acc + v.ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_scale() {
        let mut v = vec![1.0_f64, 2.0, 3.0];
        assert_eq!(vecsum(&v), 6.0);
        vecscale(&mut v, 2.0);
        assert_eq!(v, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn add_and_aadd() {
        let mut y = vec![1.0_f64, 1.0, 1.0];
        let x = vec![1.0, 2.0, 3.0];
        vecadd(&mut y, &x);
        assert_eq!(y, vec![2.0, 3.0, 4.0]);
        vecaadd(&mut y, 2.0, &x);
        assert_eq!(y, vec![4.0, 7.0, 10.0]);
    }

    #[test]
    fn dot_and_exp() {
        let x = vec![1.0_f64, 0.0, 2.0];
        let y = vec![3.0, 5.0, 1.0];
        assert_eq!(vecdot(&x, &y), 5.0);
        let mut e = vec![0.0; 3];
        vecexp(&mut e, &x);
        assert!((e[0] - std::f64::consts::E).abs() < 1e-12);
        assert_eq!(e[1], 1.0);
    }

    #[test]
    fn sumlog_matches_ln_product() {
        let x = vec![0.5_f64, 0.25, 2.0];
        let expected = (0.5_f64).ln() + (0.25_f64).ln() + (2.0_f64).ln();
        assert!((vecsumlog(&x) - expected).abs() < 1e-12);
    }
}
