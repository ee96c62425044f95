//! Orthant-probability kernel and grid evaluators
//!
//! Computes the tables behind Gaussian-copula binary sampling, cf.
//! F. Leisch, A. Weingessel and K. Hornik (1998), _On the generation of
//! correlated artificial binary data_, Working Paper 13, SFB "Adaptive
//! Information Systems and Modelling in Economics and Management Science".
//!
//! For marginal probabilities `p`, `q` and latent correlation `c`, the joint
//! probability of both binary variates being 1 is the mass of a bivariate
//! normal with mean `(qnorm(p), qnorm(q))`, unit variances and correlation
//! `c` on the positive quadrant. Degenerate parameter values have closed
//! forms and are dispatched before the general solver; the precedence of
//! those cases is load-bearing since `qnorm` is infinite at marginals 0
//! and 1.
use crate::bvn;
use crate::gauss::qnorm;
use crate::table::ProbTable;
use ndarray::{Array1, Array3, ArrayView1, Zip};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal digits the kernel retains when comparing inputs against the
/// degenerate boundaries. Inputs themselves are never mutated.
const KERNEL_DIGITS: i32 = 12;

fn round_to(x: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (x * scale).round() / scale
}

/// How the general (non-degenerate) case is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Gauss-Legendre quadrature of the bivariate normal density.
    Integrate,
    /// Averaged repeated Monte Carlo estimates.
    MonteCarlo,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "integrate" => Ok(Method::Integrate),
            "monte carlo" => Ok(Method::MonteCarlo),
            _ => Err(Error::InvalidMethod(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Unrecognized method name.
    InvalidMethod(String),
    /// Marginal probability outside `[0, 1]`.
    InvalidMarginal(f64),
    /// Correlation outside `[-1, 1]`.
    InvalidCorrelation(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMethod(s) => {
                write!(
                    f,
                    "invalid method {:?}, expected \"integrate\" or \"monte carlo\"",
                    s
                )
            }
            Error::InvalidMarginal(p) => {
                write!(f, "marginal probability {} outside [0, 1]", p)
            }
            Error::InvalidCorrelation(c) => {
                write!(f, "correlation {} outside [-1, 1]", c)
            }
        }
    }
}

impl std::error::Error for Error {}

fn check_marginal(p: f64) -> Result<f64, Error> {
    if (0. ..=1.).contains(&p) {
        Ok(p)
    } else {
        Err(Error::InvalidMarginal(p))
    }
}

fn check_correlation(c: f64) -> Result<f64, Error> {
    if (-1. ..=1.).contains(&c) {
        Ok(c)
    } else {
        Err(Error::InvalidCorrelation(c))
    }
}

// Closed forms at the degenerate boundaries, first matching rule wins.
// The correlation boundaries take precedence over the marginal ones, and
// the zero-product guard must fire before the general solver is reached.
fn closed_form(pm: f64, pn: f64, c: f64) -> Option<f64> {
    if c == -1. {
        Some((pm + pn - 1.).max(0.))
    } else if c == 0. {
        Some(pm * pn)
    } else if c == 1. {
        Some(pm.min(pn))
    } else if pm * pn == 0. {
        Some(0.)
    } else if pm == 1. {
        Some(pn)
    } else if pn == 1. {
        Some(pm)
    } else {
        None
    }
}

// Quadrature of the bivariate normal density over the positive quadrant:
// X > 0 with X ~ N(qnorm(p), 1) is Z > -qnorm(p) for standard Z.
// A non-finite quadrature result is recorded as NaN, not an error.
fn integrate_orthant(pm: f64, pn: f64, c: f64) -> f64 {
    let p = bvn::bvnd(-qnorm(pm), -qnorm(pn), c);
    if p.is_finite() {
        p.clamp(0., 1.)
    } else {
        f64::NAN
    }
}

// Mean of `n_repeats` independent estimates, each the hit fraction of
// `n_samples` bivariate normal draws. The two-level averaging (rather than
// pooling all draws) keeps the per-repeat estimates available for variance
// reporting and matches the historical estimator.
fn monte_carlo_orthant<R: Rng + ?Sized>(
    pm: f64,
    pn: f64,
    c: f64,
    n_samples: usize,
    n_repeats: usize,
    rng: &mut R,
) -> f64 {
    let q1 = qnorm(pm);
    let q2 = qnorm(pn);
    let t = (1. - c * c).sqrt();
    let mut estimates = Array1::<f64>::zeros(n_repeats);
    for est in estimates.iter_mut() {
        let x: Array1<f64> = Array1::random_using(n_samples, StandardNormal, rng);
        let y: Array1<f64> = Array1::random_using(n_samples, StandardNormal, rng);
        let hits = Zip::from(&x).and(&y).fold(0_usize, |acc, &x, &y| {
            if q1 + x > 0. && q2 + c * x + t * y > 0. {
                acc + 1
            } else {
                acc
            }
        });
        *est = hits as f64 / n_samples as f64;
    }
    estimates.mean().unwrap_or(f64::NAN)
}

/// Joint probability that two binary variates with marginals `margin_m` and
/// `margin_n`, generated by thresholding normal variates of correlation
/// `corr` at zero, are both 1.
///
/// Degenerate parameter values (`corr` in {-1, 0, 1}, zero or unit
/// marginals) are answered in closed form; otherwise the probability is
/// evaluated per `method`. `n_samples` and `n_repeats` are only consulted on
/// the Monte Carlo path, `rng` makes that path reproducible under a seeded
/// generator.
///
/// Inputs are compared against the degenerate boundaries after rounding to
/// 12 decimal digits; the caller's values are not modified. A non-finite
/// integration result is returned as NaN ("unknown probability"), never as
/// an error.
pub fn joint_probability<R: Rng + ?Sized>(
    margin_m: f64,
    margin_n: f64,
    corr: f64,
    method: Method,
    n_samples: usize,
    n_repeats: usize,
    rng: &mut R,
) -> Result<f64, Error> {
    let pm = round_to(check_marginal(margin_m)?, KERNEL_DIGITS);
    let pn = round_to(check_marginal(margin_n)?, KERNEL_DIGITS);
    let c = round_to(check_correlation(corr)?, KERNEL_DIGITS);

    let prob = match closed_form(pm, pn, c) {
        Some(p) => p,
        None => match method {
            Method::Integrate => integrate_orthant(pm, pn, c),
            Method::MonteCarlo => monte_carlo_orthant(pm, pn, c, n_samples, n_repeats, rng),
        },
    };
    log::debug!(
        "corr = {}, margins = ({}, {}): joint = {}",
        c,
        pm,
        pn,
        prob
    );
    Ok(prob)
}

/// Evaluates the kernel over the cross product of `margins` with itself and
/// every correlation in `corrs`, returning the packaged table.
///
/// Probabilities are computed once per unordered marginal pair and mirrored
/// across the diagonal of the underlying cube. Inputs are borrowed
/// immutably; keys are the marginal pairs rounded to
/// [`table::KEY_DIGITS`](crate::table::KEY_DIGITS) decimal digits.
pub fn build_table<R: Rng + ?Sized>(
    margins: &[f64],
    corrs: &[f64],
    method: Method,
    n_samples: usize,
    n_repeats: usize,
    rng: &mut R,
) -> Result<ProbTable, Error> {
    let lm = margins.len();
    let lr = corrs.len();
    let mut cube = Array3::<f64>::zeros((lm, lm, lr));
    for k in 0..lr {
        for m in 0..lm {
            for n in m..lm {
                let p = joint_probability(
                    margins[m], margins[n], corrs[k], method, n_samples, n_repeats, rng,
                )?;
                cube[[m, n, k]] = p;
                cube[[n, m, k]] = p;
            }
        }
    }
    Ok(ProbTable::from_margin_major(
        ArrayView1::from(margins),
        ArrayView1::from(corrs),
        &cube,
    ))
}

/// Evenly spaced evaluation grids: `resolution + 1` marginals over
/// `[0, 1]` and `2 * resolution + 1` correlations over `[-1, 1]`.
///
/// The correlation grid is deliberately finer than the marginal grid;
/// sensitivity of the joint probability near `|corr| = 1` matters more to a
/// downstream interpolating sampler than marginal granularity.
pub fn uniform_grids(resolution: usize) -> (Array1<f64>, Array1<f64>) {
    (
        Array1::linspace(0., 1., resolution + 1),
        Array1::linspace(-1., 1., 2 * resolution + 1),
    )
}

/// Raw output of the uniform-grid evaluator: the probability cube plus the
/// grids it was evaluated on.
///
/// The cube has shape `(2 * resolution + 1, resolution + 1, resolution + 1)`
/// and is indexed `[corr, margin, margin]`, symmetric in the marginal axes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniformCube {
    pub margins: Array1<f64>,
    pub corrs: Array1<f64>,
    pub cube: Array3<f64>,
}

/// Fills the probability cube over the uniform grids of [`uniform_grids`].
///
/// Uses the same closed-form shortcuts as [`joint_probability`] and falls
/// back to quadrature for the general case; there is no Monte Carlo option
/// in this variant. Grid values sit exactly on the degenerate boundaries, so
/// no rounding is applied.
pub fn build_uniform_cube(resolution: usize) -> UniformCube {
    let (margins, corrs) = uniform_grids(resolution);
    let lm = margins.len();
    let lr = corrs.len();
    let mut cube = Array3::<f64>::zeros((lr, lm, lm));
    for i in 0..lr {
        for j in 0..lm {
            for k in j..lm {
                let p = closed_form(margins[j], margins[k], corrs[i])
                    .unwrap_or_else(|| integrate_orthant(margins[j], margins[k], corrs[i]));
                cube[[i, j, k]] = p;
                cube[[i, k, j]] = p;
            }
        }
    }
    UniformCube {
        margins,
        corrs,
        cube,
    }
}

/// Like [`build_uniform_cube`], but packages the cube into a keyed table
/// with the same keying scheme as [`build_table`].
pub fn build_uniform_table(resolution: usize) -> ProbTable {
    let grid = build_uniform_cube(resolution);
    ProbTable::from_corr_major(grid.margins.view(), grid.corrs.view(), &grid.cube)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn integrate(p: f64, q: f64, c: f64) -> f64 {
        let mut rng = StdRng::seed_from_u64(0);
        joint_probability(p, q, c, Method::Integrate, 0, 0, &mut rng).unwrap()
    }

    #[test]
    fn test_closed_form_correlations() {
        let grid = [0., 0.25, 0.3, 0.5, 0.75, 1.];
        for &p in &grid {
            for &q in &grid {
                assert_eq!(integrate(p, q, 0.), p * q);
                assert_eq!(integrate(p, q, 1.), p.min(q));
                assert_eq!(integrate(p, q, -1.), (p + q - 1.).max(0.));
            }
        }
    }

    #[test]
    fn test_degenerate_margins() {
        for &c in &[-0.9, -0.5, 0.2, 0.7] {
            for &q in &[0.1, 0.4, 0.9] {
                assert_eq!(integrate(1., q, c), q);
                assert_eq!(integrate(q, 1., c), q);
                assert_eq!(integrate(0., q, c), 0.);
                assert_eq!(integrate(q, 0., c), 0.);
            }
        }
    }

    #[test]
    fn test_case_precedence() {
        // correlation boundaries win over marginal boundaries
        assert_eq!(integrate(1., 1., -1.), 1.);
        assert_eq!(integrate(0., 0.5, 0.), 0.);
        assert_eq!(integrate(1., 0.5, 1.), 0.5);
    }

    #[test]
    fn test_integrate_scenarios() {
        assert_eq!(integrate(0.5, 0.5, 0.), 0.25);
        assert_eq!(integrate(0.5, 0.5, 1.), 0.5);
        assert_eq!(integrate(0.3, 0.7, -1.), 0.);
        assert!((integrate(0.3, 0.7, 0.5) - 0.26690).abs() < 1e-3);
        // P(both > 0) at p = q = 1/2 is 1/4 + asin(c) / 2 pi
        let expected = 0.25 + 0.5_f64.asin() / std::f64::consts::TAU;
        assert!((integrate(0.5, 0.5, 0.5) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_kernel_symmetry() {
        for &c in &[-0.95, -0.4, 0.3, 0.8] {
            for &(p, q) in &[(0.1, 0.9), (0.25, 0.5), (0.6, 0.7)] {
                assert_eq!(integrate(p, q, c), integrate(q, p, c));
            }
        }
    }

    #[test]
    fn test_monte_carlo_agrees_with_quadrature() {
        let mut rng = StdRng::seed_from_u64(42);
        for &(p, q, c) in &[(0.4, 0.6, 0.3), (0.5, 0.5, -0.5), (0.2, 0.8, 0.7)] {
            let exact = integrate(p, q, c);
            let mc =
                joint_probability(p, q, c, Method::MonteCarlo, 20_000, 5, &mut rng).unwrap();
            assert!(
                (exact - mc).abs() < 0.01,
                "p = {}, q = {}, c = {}: {} vs {}",
                p,
                q,
                c,
                exact,
                mc
            );
        }
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("integrate".parse::<Method>().unwrap(), Method::Integrate);
        assert_eq!("monte carlo".parse::<Method>().unwrap(), Method::MonteCarlo);
        assert_eq!(
            "simulate".parse::<Method>(),
            Err(Error::InvalidMethod("simulate".to_owned()))
        );
    }

    #[test]
    fn test_out_of_range_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            joint_probability(1.5, 0.5, 0., Method::Integrate, 0, 0, &mut rng),
            Err(Error::InvalidMarginal(1.5))
        );
        assert_eq!(
            joint_probability(0.5, -0.1, 0., Method::Integrate, 0, 0, &mut rng),
            Err(Error::InvalidMarginal(-0.1))
        );
        assert_eq!(
            joint_probability(0.5, 0.5, 1.2, Method::Integrate, 0, 0, &mut rng),
            Err(Error::InvalidCorrelation(1.2))
        );
    }

    #[test]
    fn test_build_table() {
        let mut rng = StdRng::seed_from_u64(0);
        let margins = [0., 0.5, 1.];
        let corrs = [-1., 0., 1.];
        let table = build_table(&margins, &corrs, Method::Integrate, 0, 0, &mut rng).unwrap();

        // one entry per unordered pair of three marginals
        assert_eq!(table.len(), 6);
        let m = table.get(0.5, 0.5).unwrap();
        assert_eq!(m.row(0).to_vec(), vec![-1., 0., 1.]);
        assert_eq!(m.row(1).to_vec(), vec![0., 0.25, 0.5]);
        let m = table.get(1., 0.5).unwrap();
        assert_eq!(m.row(1).to_vec(), vec![0.5, 0.5, 0.5]);
        assert_eq!(table.get(0.5, 1.).unwrap(), table.get(1., 0.5).unwrap());
    }

    #[test]
    fn test_build_table_leaves_inputs_untouched() {
        let mut rng = StdRng::seed_from_u64(0);
        let margins = vec![0.1234567890123456, 0.5];
        let corrs = vec![0.9876543210987654];
        let margins_before = margins.clone();
        let corrs_before = corrs.clone();
        build_table(&margins, &corrs, Method::Integrate, 0, 0, &mut rng).unwrap();
        assert_eq!(margins, margins_before);
        assert_eq!(corrs, corrs_before);
    }

    #[test]
    fn test_uniform_grid_shapes() {
        let n = 4;
        let grid = build_uniform_cube(n);
        assert_eq!(grid.cube.dim(), (2 * n + 1, n + 1, n + 1));
        assert_eq!(grid.margins.len(), n + 1);
        assert_eq!(grid.corrs.len(), 2 * n + 1);

        let table = build_uniform_table(n);
        assert_eq!(table.len(), (n + 1) * (n + 2) / 2);
    }

    #[test]
    fn test_uniform_cube_symmetry_and_range() {
        let grid = build_uniform_cube(4);
        let (lr, lm, _) = grid.cube.dim();
        for i in 0..lr {
            for j in 0..lm {
                for k in 0..lm {
                    let v = grid.cube[[i, j, k]];
                    assert_eq!(v, grid.cube[[i, k, j]]);
                    assert!((0. ..=1.).contains(&v), "out of range: {}", v);
                }
            }
        }
    }

    #[test]
    fn test_uniform_degenerate_slices() {
        let n = 4;
        let grid = build_uniform_cube(n);
        let (_, lm, _) = grid.cube.dim();
        for j in 0..lm {
            for k in 0..lm {
                let (pj, pk) = (grid.margins[j], grid.margins[k]);
                // corr grid endpoints are -1 and 1, midpoint is 0
                assert!((grid.cube[[0, j, k]] - (pj + pk - 1.).max(0.)).abs() < 1e-12);
                assert!((grid.cube[[n, j, k]] - pj * pk).abs() < 1e-12);
                assert!((grid.cube[[2 * n, j, k]] - pj.min(pk)).abs() < 1e-12);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_independence(p in 0.0..=1.0f64, q in 0.0..=1.0f64) {
            prop_assert!((integrate(p, q, 0.) - p * q).abs() < 1e-11);
        }

        #[test]
        fn prop_symmetry(p in 0.01..=0.99f64, q in 0.01..=0.99f64, c in -0.99..=0.99f64) {
            prop_assert!((integrate(p, q, c) - integrate(q, p, c)).abs() < 1e-12);
        }

        #[test]
        fn prop_range_bound(p in 0.0..=1.0f64, q in 0.0..=1.0f64, c in -1.0..=1.0f64) {
            let v = integrate(p, q, c);
            prop_assert!(v.is_nan() || (0. ..=1.).contains(&v));
        }

        #[test]
        fn prop_bounded_by_marginals(p in 0.01..=0.99f64, q in 0.01..=0.99f64, c in -0.99..=0.99f64) {
            // Frechet bounds for the joint probability
            let v = integrate(p, q, c);
            prop_assert!(v <= p.min(q) + 1e-9);
            prop_assert!(v >= (p + q - 1.).max(0.) - 1e-9);
        }
    }
}
