// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! One-dimensional Gauss–Hermite and Gauss–Legendre quadrature rules,
//! computed on demand (rather than looked up from a fixed table) via
//! Newton iteration on the defining orthogonal polynomial, the classical
//! approach also used by the original solver's precomputed node tables.

/// A 1-D quadrature level: `nodes.len() == weights.len() == level`.
#[derive(Clone, Debug)]
pub struct OneDRule {
    pub nodes: Vec<f64>,
    pub weights: Vec<f64>,
}

/// `n`-point Gauss–Legendre rule on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> OneDRule {
    assert!(n >= 1);
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let m = (n + 1) / 2;
    for i in 0..m {
        let mut z = ((std::f64::consts::PI * (i as f64 + 0.75)) / (n as f64 + 0.5)).cos();
        let mut pp = 0.0;
        for _ in 0..100 {
            let (p, deriv) = legendre_pair(n, z);
            pp = deriv;
            let z1 = z;
            z = z1 - p / pp;
            if (z - z1).abs() < 1e-15 {
                break;
            }
        }
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        let w = 2.0 / ((1.0 - z * z) * pp * pp);
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    OneDRule { nodes, weights }
}

fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let p2 = ((2 * k - 1) as f64 * x * p1 - (k - 1) as f64 * p0) / k as f64;
        p0 = p1;
        p1 = p2;
    }
    let deriv = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, deriv)
}

/// `n`-point Gauss–Hermite rule for the standard normal density: returns
/// nodes/weights such that `sum w_i f(x_i) ≈ E[f(Z)]` for `Z ~ N(0,1)`
/// (the "probabilists'" normalisation, convenient for the solver's
/// expectation contractions).
pub fn gauss_hermite(n: usize) -> OneDRule {
    assert!(n >= 1);
    let physicist = gauss_hermite_physicist(n);
    let nodes = physicist.nodes.iter().map(|x| x * std::f64::consts::SQRT_2).collect();
    let weights = physicist
        .weights
        .iter()
        .map(|w| w / std::f64::consts::PI.sqrt())
        .collect();
    OneDRule { nodes, weights }
}

fn gauss_hermite_physicist(n: usize) -> OneDRule {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let m = (n + 1) / 2;
    for i in 0..m {
        let mut z = initial_hermite_guess(n, i);
        let mut pp = 0.0;
        for _ in 0..100 {
            let (p, deriv) = hermite_pair(n, z);
            pp = deriv;
            let z1 = z;
            z = z1 - p / pp;
            if (z - z1).abs() < 1e-14 {
                break;
            }
        }
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        let (p_at, _) = hermite_pair(n - 1, z);
        let w = (2.0_f64.powi(n as i32 - 1) * factorial(n) as f64 * std::f64::consts::PI.sqrt())
            / ((n as f64 * p_at).powi(2));
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    OneDRule { nodes, weights }
}

fn initial_hermite_guess(n: usize, i: usize) -> f64 {
    // Numerical-Recipes-style starting guesses, good enough for the Newton
    // iteration above to converge from.
    if i == 0 && n % 2 == 1 {
        return 0.0;
    }
    let nf = n as f64;
    ((2.0 * nf + 1.0).sqrt() - 1.85575 * (2.0 * nf + 1.0).powf(-1.0 / 6.0))
        * (((i as f64 + 1.0) / nf).sqrt())
}

fn hermite_pair(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut h0 = 1.0;
    let mut h1 = 2.0 * x;
    for k in 2..=n {
        let h2 = 2.0 * x * h1 - 2.0 * (k - 1) as f64 * h0;
        h0 = h1;
        h1 = h2;
    }
    let deriv = 2.0 * n as f64 * h0;
    (h1, deriv)
}

fn factorial(n: usize) -> u128 {
    (1..=n as u128).product::<u128>().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legendre_weights_sum_to_interval_length() {
        for n in 1..8 {
            let rule = gauss_legendre(n);
            let sum: f64 = rule.weights.iter().sum();
            assert!((sum - 2.0).abs() < 1e-10, "n={n} sum={sum}");
        }
    }

    #[test]
    fn hermite_integrates_constant_to_one() {
        for n in 1..8 {
            let rule = gauss_hermite(n);
            let sum: f64 = rule.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-8, "n={n} sum={sum}");
        }
    }

    #[test]
    fn hermite_matches_known_second_moment() {
        let rule = gauss_hermite(6);
        let second: f64 = rule
            .nodes
            .iter()
            .zip(rule.weights.iter())
            .map(|(x, w)| x * x * w)
            .sum();
        assert!((second - 1.0).abs() < 1e-8);
    }
}
