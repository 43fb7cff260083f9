// Numeric summaries: least-squares regression and kernel density estimates

use crate::ir::{Distribution, ViolinShape};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Ordinary least squares fit of `y = intercept + slope * x`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Standard error of the slope
    pub std_err: f64,
    /// Two-sided p-value for a zero slope; NaN with fewer than three points
    pub p_value: f64,
    pub n: usize,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Equation using the raw field specifications as variable names
    pub fn equation(&self, x_name: &str, y_name: &str) -> String {
        format!(
            "{} = {:.4} + {:.4} * {}",
            y_name, self.intercept, self.slope, x_name
        )
    }
}

/// Fit a line through paired finite values
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<Regression> {
    if x.len() != y.len() {
        bail!("Regression inputs differ in length ({} vs {})", x.len(), y.len());
    }
    let n = x.len();
    if n < 2 {
        bail!("Regression needs at least two data points, got {}", n);
    }

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        bail!("Regression is undefined: every X value is identical");
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r = if syy == 0.0 { 0.0 } else { (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0) };
    let r_squared = r * r;
    let std_err = if n > 2 {
        ((1.0 - r_squared) * syy / sxx / (nf - 2.0)).sqrt()
    } else {
        0.0
    };
    let p_value = slope_p_value(slope, std_err, n)?;

    Ok(Regression {
        slope,
        intercept,
        r_squared,
        std_err,
        p_value,
        n,
    })
}

/// t-test of the slope against zero with `n - 2` degrees of freedom
fn slope_p_value(slope: f64, std_err: f64, n: usize) -> Result<f64> {
    if n <= 2 {
        return Ok(f64::NAN);
    }
    if std_err == 0.0 {
        return Ok(if slope == 0.0 { 1.0 } else { 0.0 });
    }

    let t = slope / std_err;
    let dist = StudentsT::new(0.0, 1.0, (n - 2) as f64)
        .context("Invalid degrees of freedom for the slope t-test")?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Silverman's rule of thumb for bandwidth selection
pub fn silverman_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if n < 2.0 {
        return 1.0;
    }

    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    // IQR-based estimate for robustness
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);

    // h = 0.9 * min(std, IQR/1.34) * n^(-1/5)
    let scale = if iqr > 0.0 { std_dev.min(iqr / 1.34) } else { std_dev };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Gaussian KDE on an evenly spaced grid, density normalised to 0..1
pub fn compute_kde(data: &[f64], bandwidth: f64) -> (Vec<f64>, Vec<f64>) {
    const GRID_POINTS: usize = 128;

    let n = data.len() as f64;
    if n == 0.0 {
        return (vec![], vec![]);
    }

    let min_v = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_v = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    // Extend range slightly for smooth edges
    let extend = 3.0 * bandwidth;
    let start = min_v - extend;
    let range = (max_v + extend) - start;
    if range <= 0.0 {
        return (vec![min_v], vec![1.0]);
    }

    let step = range / (GRID_POINTS - 1) as f64;
    let mut grid = Vec::with_capacity(GRID_POINTS);
    let mut density = Vec::with_capacity(GRID_POINTS);

    for i in 0..GRID_POINTS {
        let v = start + i as f64 * step;
        grid.push(v);
        let d: f64 = data.iter().map(|&xi| gaussian_kernel((v - xi) / bandwidth)).sum();
        density.push(d / (n * bandwidth));
    }

    let max_density = density.iter().fold(0.0f64, |a, &b| a.max(b));
    if max_density > 0.0 {
        for d in &mut density {
            *d /= max_density;
        }
    }

    (grid, density)
}

/// Linear interpolation between closest ranks of sorted data
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

/// Density outline and quartiles per category; empty groups are skipped
pub fn violin_shapes(groups: &[Distribution]) -> Vec<ViolinShape> {
    groups
        .iter()
        .filter(|g| !g.values.is_empty())
        .map(|g| {
            let mut sorted = g.values.clone();
            sorted.sort_by(f64::total_cmp);
            let bandwidth = silverman_bandwidth(&sorted);
            let (grid, density) = compute_kde(&sorted, bandwidth);
            ViolinShape {
                label: g.label.clone(),
                grid,
                density,
                q1: percentile(&sorted, 0.25),
                median: percentile(&sorted, 0.5),
                q3: percentile(&sorted, 0.75),
            }
        })
        .collect()
}
