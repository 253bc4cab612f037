//! Normal distribution helpers
//!
//! Closed-form error function (Abramowitz & Stegun 7.1.26, max absolute
//! error about 1.5e-7) and the normal CDF built on top of it.

const A1: f64 = 0.254_829_592;
const A2: f64 = -0.284_496_736;
const A3: f64 = 1.421_413_741;
const A4: f64 = -1.453_152_027;
const A5: f64 = 1.061_405_429;
const P: f64 = 0.327_591_1;

/// Gauss error function.
///
/// Odd-symmetric by construction: evaluated on `|x|` and the sign restored,
/// so `erf(-x) == -erf(x)` holds bit-for-bit.
#[must_use]
pub fn erf(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / P.mul_add(x, 1.0);
    let poly = A5.mul_add(t, A4).mul_add(t, A3).mul_add(t, A2).mul_add(t, A1) * t;
    let y = poly.mul_add(-(-x * x).exp(), 1.0);

    sign * y
}

/// Cumulative distribution function of `N(mean, variance)` at `x`.
///
/// Returns `None` for a negative variance. A zero variance degenerates to a
/// step at the mean.
#[must_use]
pub fn cdf(x: f64, mean: f64, variance: f64) -> Option<f64> {
    if variance < 0.0 || variance.is_nan() {
        return None;
    }
    if variance == 0.0 {
        return Some(match x.partial_cmp(&mean)? {
            std::cmp::Ordering::Less => 0.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Greater => 1.0,
        });
    }

    Some(0.5 * (1.0 + erf((x - mean) / (2.0 * variance).sqrt())))
}

/// Standard normal CDF, `P(Z <= z)`.
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}
