//! `commonprob` precomputes joint occurrence probabilities for pairs of
//! binary (Bernoulli) random variates generated by thresholding correlated
//! standard normal variates at zero, the Gaussian copula construction used
//! by correlated-binary samplers such as `rmvbin` in the `bindata` R package.
//!
//! For every combination of two marginal probabilities and a correlation
//! value, the crate computes the probability that both components of a
//! bivariate normal variate with mean `(qnorm(p), qnorm(q))` and the given
//! correlation are larger than zero, either by Gauss-Legendre quadrature of
//! the bivariate normal density or by Monte Carlo simulation. Results are
//! packaged into a table keyed by the marginal pair, one 2 x |corrs| matrix
//! per pair, ready for lookup and interpolation by a downstream sampler.

extern crate ndarray;
extern crate ndarray_rand;
extern crate statrs;

pub mod bvn;
pub mod commonprob;
pub mod table;

pub use crate::commonprob::{
    build_table, build_uniform_cube, build_uniform_table, joint_probability, uniform_grids, Error,
    Method, UniformCube,
};
pub use crate::table::{PairKey, ProbTable};

/// `erf`/`erfc` family of error functions and the standard normal
/// distribution/quantile functions built on them
///
/// Uses [statrs](https://crates.io/crates/statrs)
pub mod gauss {
    use num::traits::FloatConst;
    pub use statrs::function::erf::{erf, erfc, erfc_inv};

    /// standard normal CDF $\Phi(x)$
    pub fn phid(x: f64) -> f64 {
        0.5 * erfc(-x * f64::FRAC_1_SQRT_2())
    }

    /// standard normal quantile $\Phi^{-1}(p)$ for $p \in (0,1)$
    ///
    /// Returns $-\infty$ at 0 and $\infty$ at 1; callers computing bivariate
    /// probabilities guard those endpoints with closed-form shortcuts.
    pub fn qnorm(p: f64) -> f64 {
        -f64::SQRT_2() * erfc_inv(2. * p)
    }

}
