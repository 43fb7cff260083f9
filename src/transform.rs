// Aggregation planning: decide how resolved series become plottable data

use crate::dates::{parse_date_label, DateFormat};
use crate::error::{EngineError, EngineResult};
use crate::ir::{AggregationMode, Distribution, HeatmapGrid, PlotSeries};
use crate::series::{Series, Value};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Numeric X with fewer distinct values than this is treated as categorical
pub const CATEGORICAL_DISTINCT_LIMIT: usize = 30;

/// Choose between grouping and row-wise plotting and build the series.
///
/// `dates` is the session date format, used to recognise date-like labels.
pub fn plan(x: &Series, y: &Series, dates: Option<&DateFormat>) -> EngineResult<PlotSeries> {
    let mode = aggregation_mode(x);
    debug!("Planning '{}' vs '{}' as {:?}", y.name, x.name, mode);
    match mode {
        AggregationMode::Categorical => plan_categorical(x, y, dates),
        AggregationMode::Continuous => Ok(plan_continuous(x, y, dates)),
    }
}

pub fn aggregation_mode(x: &Series) -> AggregationMode {
    if !x.is_numeric() || x.distinct_count() < CATEGORICAL_DISTINCT_LIMIT {
        AggregationMode::Categorical
    } else {
        AggregationMode::Continuous
    }
}

fn require_numeric(series: &Series) -> EngineResult<Vec<f64>> {
    series.to_f64().ok_or_else(|| EngineError::TypeMismatch {
        field: series.name.clone(),
        found: series.kind.to_string(),
    })
}

/// Distinct keys of `values` in first-seen order, with the row indices of each
fn group_rows(values: &[Value]) -> Vec<(Value, Vec<usize>)> {
    let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row, value) in values.iter().enumerate() {
        let key = value.label();
        match index.get(&key) {
            Some(&g) => groups[g].1.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push((value.clone(), vec![row]));
            }
        }
    }
    groups
}

fn date_key(value: &Value, dates: Option<&DateFormat>) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Missing => None,
        other => parse_date_label(dates, &other.label()),
    }
}

/// Stable chronological order of `values` when at least one of them parses
/// as a date; unparseable values go last. `None` when nothing parses.
fn chronological_order(values: &[Value], dates: Option<&DateFormat>) -> Option<Vec<usize>> {
    let keys: Vec<Option<NaiveDateTime>> = values.iter().map(|v| date_key(v, dates)).collect();
    if keys.iter().all(Option::is_none) {
        return None;
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| match (&keys[a], &keys[b]) {
        (Some(ka), Some(kb)) => ka.cmp(kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Some(order)
}

fn sum_present(values: &[f64], rows: &[usize]) -> f64 {
    rows.iter().map(|&r| values[r]).filter(|v| !v.is_nan()).sum()
}

fn plan_categorical(x: &Series, y: &Series, dates: Option<&DateFormat>) -> EngineResult<PlotSeries> {
    let y_values = require_numeric(y)?;
    let mut groups = group_rows(&x.values);

    let keys: Vec<Value> = groups.iter().map(|(k, _)| k.clone()).collect();
    if let Some(order) = chronological_order(&keys, dates) {
        let mut slots: Vec<Option<(Value, Vec<usize>)>> = groups.into_iter().map(Some).collect();
        groups = order.into_iter().filter_map(|i| slots[i].take()).collect();
    }

    let mut x_out = Vec::with_capacity(groups.len());
    let mut y_out = Vec::with_capacity(groups.len());
    for (key, rows) in groups {
        y_out.push(sum_present(&y_values, &rows));
        x_out.push(key);
    }

    Ok(PlotSeries {
        mode: AggregationMode::Categorical,
        x: Series::new(x.name.clone(), x.kind, x_out),
        y: Series::numeric(y.name.clone(), y_out),
    })
}

fn plan_continuous(x: &Series, y: &Series, dates: Option<&DateFormat>) -> PlotSeries {
    let (x_values, y_values) = match chronological_order(&x.values, dates) {
        Some(order) => (
            order.iter().map(|&i| x.values[i].clone()).collect(),
            order.iter().map(|&i| y.values[i].clone()).collect(),
        ),
        None => (x.values.clone(), y.values.clone()),
    };

    PlotSeries {
        mode: AggregationMode::Continuous,
        x: Series::new(x.name.clone(), x.kind, x_values),
        y: Series::new(y.name.clone(), y.kind, y_values),
    }
}

fn ordered_labels(values: &[Value], dates: Option<&DateFormat>) -> Vec<String> {
    let groups = group_rows(values);
    let keys: Vec<Value> = groups.into_iter().map(|(k, _)| k).collect();
    match chronological_order(&keys, dates) {
        Some(order) => order.iter().map(|&i| keys[i].label()).collect(),
        None => keys.iter().map(Value::label).collect(),
    }
}

/// Pivot `value` into a grid of distinct Y rows by distinct X columns,
/// summing per cell. Rows with a missing X or Y are left out.
pub fn plan_heatmap(
    x: &Series,
    y: &Series,
    value: &Series,
    dates: Option<&DateFormat>,
) -> EngineResult<HeatmapGrid> {
    let v = require_numeric(value)?;

    let keep: Vec<usize> = (0..x.len())
        .filter(|&i| !x.values[i].is_missing() && !y.values[i].is_missing())
        .collect();
    let xs: Vec<Value> = keep.iter().map(|&i| x.values[i].clone()).collect();
    let ys: Vec<Value> = keep.iter().map(|&i| y.values[i].clone()).collect();

    let x_labels = ordered_labels(&xs, dates);
    let y_labels = ordered_labels(&ys, dates);
    let col_of: HashMap<&str, usize> = x_labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
    let row_of: HashMap<&str, usize> = y_labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();

    let mut cells = vec![vec![0.0; x_labels.len()]; y_labels.len()];
    for (k, &row) in keep.iter().enumerate() {
        let cell = v[row];
        if cell.is_nan() {
            continue;
        }
        let (row_key, col_key) = (ys[k].label(), xs[k].label());
        if let (Some(&r), Some(&c)) = (row_of.get(row_key.as_str()), col_of.get(col_key.as_str())) {
            cells[r][c] += cell;
        }
    }

    Ok(HeatmapGrid {
        x_labels,
        y_labels,
        cells,
    })
}

/// Finite values of `value` grouped per category label
pub fn plan_distribution(
    category: &Series,
    value: &Series,
    dates: Option<&DateFormat>,
) -> EngineResult<Vec<Distribution>> {
    let v = require_numeric(value)?;
    let mut groups = group_rows(&category.values);

    let keys: Vec<Value> = groups.iter().map(|(k, _)| k.clone()).collect();
    if let Some(order) = chronological_order(&keys, dates) {
        let mut slots: Vec<Option<(Value, Vec<usize>)>> = groups.into_iter().map(Some).collect();
        groups = order.into_iter().filter_map(|i| slots[i].take()).collect();
    }

    Ok(groups
        .into_iter()
        .map(|(key, rows)| Distribution {
            label: key.label(),
            values: rows.iter().map(|&r| v[r]).filter(|x| x.is_finite()).collect(),
        })
        .collect())
}

/// Numeric pairs for regression, dropping rows where either side is not finite
pub fn plan_pairs(x: &Series, y: &Series) -> EngineResult<(Vec<f64>, Vec<f64>)> {
    let xs = require_numeric(x)?;
    let ys = require_numeric(y)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .unzip())
}
