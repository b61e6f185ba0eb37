//! Sample random variates from supported distributions

use rand::prelude::*;

/// Sample a Poisson random variate from a distribution with mean `lambda` using provided `rng`
///
/// May panic or produce incorrect results on invalid lambda
///
/// Optimized for case where a single sample is needed for a given set of parameters
pub fn poisson<R: Rng>(lambda: f64, rng: &mut R) -> u64 {
    // rand_distr Poisson is slower for single draws with small lambda
    if lambda <= 10.0 {
        direct_poisson(lambda, rng)
    } else {
        rand_distr::Poisson::new(lambda).unwrap().sample(rng)
    }
}

/// Sample a Poisson random variate from a distribution with mean `lambda` using provided `rng`
///
/// Uses the Algorithm 3 described in <https://www.jstor.org/stable/2347913>
///
/// Faster than the `rand_distr` implementation for single samples with small lambdas
fn direct_poisson<R: Rng>(lambda: f64, rng: &mut R) -> u64 {
    assert!(lambda >= 0.0, "Poisson called with negative lambda");
    let mut x = 0;
    let mut p = (-lambda).exp();
    let mut u = rng.gen::<f64>();

    while u > p {
        x += 1;
        u -= p;
        p *= lambda / x as f64;
    }

    x
}

/// Fair Bernoulli trial with success probability `p`
///
/// # Panics
/// Panics if `p` lies outside `[0, 1]`
pub fn bernoulli<R: Rng>(p: f64, rng: &mut R) -> bool {
    rng.gen_bool(p)
}

/// Uniform integer on the inclusive range `[lo, hi]`
pub fn uniform_int<R: Rng>(lo: i64, hi: i64, rng: &mut R) -> i64 {
    assert!(lo <= hi);
    rng.gen_range(lo, hi + 1)
}

/// Sample an index from a discrete cumulative distribution
///
/// The final entry of `cdf` must equal one; intermediate entries must be
/// non-decreasing.
pub fn select_cdf<R: Rng>(cdf: &[f64], rng: &mut R) -> usize {
    assert!(!cdf.is_empty());
    let u = rng.gen::<f64>();

    for (index, &bound) in cdf.iter().enumerate() {
        if u < bound {
            return index;
        }
    }

    cdf.len() - 1
}

/// Semi-stochastic rounding: round `x` down, then add one with probability
/// equal to the discarded fractional part
///
/// The expectation of the result equals `x`.
pub fn discretize<R: Rng>(x: f64, rng: &mut R) -> u64 {
    assert!(x >= 0.0 && x.is_finite(), "discretize called on {}", x);

    let floor = x.floor();
    let frac = x - floor;

    floor as u64 + u64::from(frac > 0.0 && rng.gen_bool(frac))
}
