//! Probability densities used by the likelihood models.
//!
//! Everything here works in log space and returns `-inf` (never NaN) for
//! impossible values so callers can clamp with `f64::max`.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Log of the normal density N(x; mu, sigma).
#[inline]
pub fn normal_log_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
}

/// Normal cumulative distribution P(X <= x).
#[inline]
pub fn normal_cdf(x: f64, mu: f64, sigma: f64) -> f64 {
    0.5 * libm::erfc(-(x - mu) / sigma * FRAC_1_SQRT_2)
}

/// Normal survival function P(X > x), accurate in the upper tail.
#[inline]
pub fn normal_sf(x: f64, mu: f64, sigma: f64) -> f64 {
    0.5 * libm::erfc((x - mu) / sigma * FRAC_1_SQRT_2)
}

/// Log of the Rice density with noncentrality `nu` and scale `sigma`.
///
/// Written in terms of the exponentially scaled Bessel function so that large
/// arguments do not overflow.
pub fn rice_log_pdf(x: f64, nu: f64, sigma: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let s2 = sigma * sigma;
    let d = x - nu;
    x.ln() - s2.ln() - d * d / (2.0 * s2) + ln_bessel_i0e(x * nu / s2)
}

/// ln(I0(z) * exp(-|z|)), Abramowitz & Stegun 9.8.1 / 9.8.2.
fn ln_bessel_i0e(z: f64) -> f64 {
    let ax = z.abs();
    if ax < 3.75 {
        let t = (ax / 3.75).powi(2);
        let i0 = 1.0
            + t * (3.515_622_9
                + t * (3.089_942_4
                    + t * (1.206_749_2 + t * (0.265_973_2 + t * (0.036_076_8 + t * 0.004_581_3)))));
        i0.ln() - ax
    } else {
        let t = 3.75 / ax;
        let poly = 0.398_942_28
            + t * (0.013_285_92
                + t * (0.002_253_19
                    + t * (-0.001_575_65
                        + t * (0.009_162_81
                            + t * (-0.020_577_06
                                + t * (0.026_355_37 + t * (-0.016_476_33 + t * 0.003_923_77)))))));
        poly.ln() - 0.5 * ax.ln()
    }
}

/// Log of the density of a circle edge at distance `dist` from a centre whose
/// diameter is log-normal with log-mean `log_mu` and log-sigma `log_sigma`,
/// scaled to a density per metre near the mean diameter `diam`.
#[inline]
pub fn edge_log_density(dist: f64, log_mu: f64, log_sigma: f64, diam: f64) -> f64 {
    normal_log_pdf((2.0 * dist).ln(), log_mu, log_sigma) - diam.ln()
}

/// Log-probability that a leg of log-normal diameter fits within `clear`
/// metres of a ray that is known to be unobstructed.
#[inline]
pub fn clear_path_log_like(clear: f64, log_mu: f64, log_sigma: f64) -> f64 {
    normal_cdf((2.0 * clear).ln(), log_mu, log_sigma).ln()
}

/// A function tabulated on a uniform grid, linearly interpolated.
#[derive(Debug, Clone)]
pub struct LookupTable {
    min: f64,
    step: f64,
    values: Vec<f64>,
    outside: f64,
}

impl LookupTable {
    /// Tabulate `f` at `n` points spanning `[min, max]`. Lookups outside the
    /// range return `outside`.
    pub fn tabulate(min: f64, max: f64, n: usize, outside: f64, f: impl Fn(f64) -> f64) -> Self {
        let n = n.max(2);
        let step = (max - min) / (n - 1) as f64;
        let values = (0..n).map(|i| f(min + i as f64 * step)).collect();
        Self {
            min,
            step,
            values,
            outside,
        }
    }

    pub fn lookup(&self, x: f64) -> f64 {
        let pos = (x - self.min) / self.step;
        if !(pos >= 0.0) || pos > (self.values.len() - 1) as f64 {
            return self.outside;
        }
        let i = pos.floor() as usize;
        if i + 1 >= self.values.len() {
            return self.values[self.values.len() - 1];
        }
        let frac = pos - i as f64;
        let (a, b) = (self.values[i], self.values[i + 1]);
        if !a.is_finite() || !b.is_finite() {
            // Interpolating against -inf yields NaN; take the nearer sample
            return if frac < 0.5 { a } else { b };
        }
        a + (b - a) * frac
    }
}

/// Heading in degrees of a planar vector, counter-clockwise from +x.
#[inline]
pub fn heading_degrees(x: f64, y: f64) -> f64 {
    y.atan2(x) * 180.0 / PI
}
