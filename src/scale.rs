// Magnitude scaling and axis helpers

use crate::series::{Series, Value};

pub const MILLIONS_SUFFIX: &str = "('M)";
pub const THOUSANDS_SUFFIX: &str = "('000)";

/// Divisor and suffix for values whose largest finite magnitude is `max_abs`
fn magnitude(max_abs: f64) -> (f64, &'static str) {
    if max_abs >= 1_000_000.0 {
        (1_000_000.0, MILLIONS_SUFFIX)
    } else if max_abs >= 1_000.0 {
        (1_000.0, THOUSANDS_SUFFIX)
    } else {
        (1.0, "")
    }
}

fn max_abs<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values
        .filter(|v| v.is_finite())
        .fold(0.0f64, |a, &b| a.max(b.abs()))
}

/// Rescale a numeric series to millions or thousands when its magnitude
/// calls for it. Non-numeric series come back unchanged with no suffix.
pub fn scale(series: &Series) -> (Series, &'static str) {
    if !series.is_numeric() {
        return (series.clone(), "");
    }

    let largest = max_abs(series.values.iter().filter_map(|v| match v {
        Value::Number(n) => Some(n),
        _ => None,
    }));
    let (divisor, suffix) = magnitude(largest);
    if divisor == 1.0 {
        return (series.clone(), "");
    }

    let values = series
        .values
        .iter()
        .map(|v| match v {
            Value::Number(n) => Value::Number(n / divisor),
            other => other.clone(),
        })
        .collect();
    (Series::new(series.name.clone(), series.kind, values), suffix)
}

/// Show every `tick_step(n)`-th category label so dense axes stay readable
pub fn tick_step(n: usize) -> usize {
    if n > 30 {
        (n / 10).max(1)
    } else if n > 15 {
        2
    } else {
        1
    }
}

/// Round to a whole number with comma thousands separators
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Axis tick label: thousands style for wide ranges, two decimals otherwise
pub fn format_axis_value(value: f64, span: f64) -> String {
    if span >= 10.0 {
        format_thousands(value)
    } else {
        format!("{:.2}", value)
    }
}

/// Min/max of the finite values padded by 5% each side, or `None` when there
/// is nothing finite. With `include_zero` the range always reaches 0.
pub fn padded_range(values: &[f64], include_zero: bool) -> Option<(f64, f64)> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (mut min, mut max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return None;
    }
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return Some((min - 1.0, max + 1.0));
    }
    let pad = (max - min) * 0.05;
    Some((
        if include_zero && min == 0.0 { 0.0 } else { min - pad },
        if include_zero && max == 0.0 { 0.0 } else { max + pad },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SemanticType;

    #[test]
    fn test_scale_millions() {
        let s = Series::numeric("v", vec![500_000.0, 2_000_000.0]);
        let (scaled, suffix) = scale(&s);
        assert_eq!(suffix, "('M)");
        assert_eq!(scaled.to_f64().unwrap(), vec![0.5, 2.0]);
    }

    #[test]
    fn test_scale_thousands_uses_absolute_value() {
        let s = Series::numeric("v", vec![-2_500.0, 10.0]);
        let (scaled, suffix) = scale(&s);
        assert_eq!(suffix, "('000)");
        assert_eq!(scaled.to_f64().unwrap(), vec![-2.5, 0.01]);
    }

    #[test]
    fn test_small_values_unscaled() {
        let s = Series::numeric("v", vec![1.0, 999.0, f64::NAN]);
        let (scaled, suffix) = scale(&s);
        assert_eq!(suffix, "");
        assert_eq!(scaled, s);
    }

    #[test]
    fn test_non_numeric_passes_through() {
        let s = Series::new("t", SemanticType::Categorical, vec![Value::Text("a".into())]);
        assert_eq!(scale(&s), (s.clone(), ""));
    }

    #[test]
    fn test_infinite_values_ignored_for_magnitude() {
        let (scaled, suffix) = scale(&Series::numeric("v", vec![f64::INFINITY, 12.0]));
        assert_eq!(suffix, "");
        assert_eq!(scaled.values[1], Value::Number(12.0));
    }

    #[test]
    fn test_tick_step() {
        assert_eq!(tick_step(5), 1);
        assert_eq!(tick_step(15), 1);
        assert_eq!(tick_step(16), 2);
        assert_eq!(tick_step(30), 2);
        assert_eq!(tick_step(31), 3);
        assert_eq!(tick_step(250), 25);
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(12345.0), "12,345");
        assert_eq!(format_thousands(-1234567.0), "-1,234,567");
        assert_eq!(format_thousands(1000.0), "1,000");
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(&[], false), None);
        assert_eq!(padded_range(&[f64::NAN], false), None);
        assert_eq!(padded_range(&[5.0], false), Some((4.0, 6.0)));
        let (lo, hi) = padded_range(&[10.0, 20.0], true).unwrap();
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 21.0);
    }
}
