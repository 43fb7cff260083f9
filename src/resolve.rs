// Field resolution: turn a raw field expression into a typed Series

use crate::catalog::FieldCatalog;
use crate::data::{is_missing, parse_number, Dataset};
use crate::dates::DateFormat;
use crate::error::{EngineError, EngineResult};
use crate::parser::{parse_formula, substitute_ordinals, Expr};
use crate::series::{SemanticType, Series, Value};
use tracing::debug;

/// Everything needed to resolve fields against one dataset view
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub data: &'a Dataset,
    pub date_format: Option<&'a DateFormat>,
    pub date_fields: &'a [String],
}

impl<'a> ResolveContext<'a> {
    pub fn new(data: &'a Dataset) -> Self {
        Self {
            data,
            date_format: None,
            date_fields: &[],
        }
    }

    pub fn with_dates(mut self, format: &'a DateFormat, fields: &'a [String]) -> Self {
        self.date_format = Some(format);
        self.date_fields = fields;
        self
    }

    fn is_date_field(&self, name: &str) -> bool {
        self.date_format.is_some() && self.date_fields.iter().any(|f| f == name)
    }
}

/// Resolve a raw field expression, trying in order: ordinal substitution and
/// formula evaluation, an exact column name, then a numeric constant.
pub fn resolve_field(raw: &str, ctx: &ResolveContext) -> EngineResult<Series> {
    let catalog = FieldCatalog::from_dataset(ctx.data);
    match resolve_formula(raw, &catalog, ctx) {
        Ok(series) => return Ok(series),
        Err(e) => debug!("'{}' is not a formula: {}", raw, e),
    }

    if let Some(position) = catalog.ordinal_of(raw) {
        return Ok(column_series(ctx, position - 1));
    }

    if let Ok(value) = raw.trim().parse::<f64>() {
        return Ok(Series::constant(raw, value, ctx.data.row_count()));
    }

    Err(EngineError::UnresolvableField(raw.to_string()))
}

/// Resolve a field and require it to be numeric
pub fn resolve_numeric_field(raw: &str, ctx: &ResolveContext) -> EngineResult<Series> {
    let series = resolve_field(raw, ctx)?;
    if !series.is_numeric() {
        return Err(EngineError::TypeMismatch {
            field: raw.to_string(),
            found: series.kind.to_string(),
        });
    }
    Ok(series)
}

fn resolve_formula(raw: &str, catalog: &FieldCatalog, ctx: &ResolveContext) -> EngineResult<Series> {
    let substituted = substitute_ordinals(raw, catalog)?;
    let (_, expr) = parse_formula(&substituted)
        .map_err(|e| EngineError::Formula(format!("cannot parse '{}': {}", substituted, e)))?;

    // a lone column reference comes back untouched, whatever its type
    if let Expr::Column(name) = &expr {
        let position = catalog
            .ordinal_of(name)
            .ok_or_else(|| EngineError::ColumnNotFound(name.clone()))?;
        return Ok(column_series(ctx, position - 1));
    }

    let name = raw.trim();
    match evaluate(&expr, ctx)? {
        Evaluated::Column(values) => Ok(Series::numeric(name, values)),
        Evaluated::Scalar(value) => Ok(Series::constant(name, value, ctx.data.row_count())),
    }
}

/// Build the typed series for one column of the view. A detected date
/// column that is already numeric (epoch seconds, say) stays numeric.
pub fn column_series(ctx: &ResolveContext, index: usize) -> Series {
    let name = &ctx.data.headers()[index];
    let numeric = ctx.data.is_numeric_column(index);

    if ctx.is_date_field(name) && !numeric {
        if let Some(format) = ctx.date_format {
            let values = ctx
                .data
                .column(index)
                .map(|cell| match format.parse_lenient(cell) {
                    Some(d) => Value::Date(d),
                    None if is_missing(cell) => Value::Missing,
                    None => Value::Text(cell.to_string()),
                })
                .collect();
            return Series::new(name.clone(), SemanticType::Datetime, values);
        }
    }

    if numeric {
        let values = ctx
            .data
            .column(index)
            .map(|cell| parse_number(cell).map_or(Value::Missing, Value::Number))
            .collect();
        return Series::new(name.clone(), SemanticType::Numeric, values);
    }

    let values = ctx
        .data
        .column(index)
        .map(|cell| {
            if is_missing(cell) {
                Value::Missing
            } else {
                Value::Text(cell.to_string())
            }
        })
        .collect();
    Series::new(name.clone(), SemanticType::Categorical, values)
}

enum Evaluated {
    Scalar(f64),
    Column(Vec<f64>),
}

fn evaluate(expr: &Expr, ctx: &ResolveContext) -> EngineResult<Evaluated> {
    match expr {
        Expr::Number(n) => Ok(Evaluated::Scalar(*n)),
        Expr::Column(name) => {
            let index = ctx
                .data
                .column_index(name)
                .ok_or_else(|| EngineError::ColumnNotFound(name.clone()))?;
            let series = column_series(ctx, index);
            let values = series.to_f64().ok_or_else(|| EngineError::TypeMismatch {
                field: name.clone(),
                found: series.kind.to_string(),
            })?;
            Ok(Evaluated::Column(values))
        }
        Expr::Neg(inner) => Ok(match evaluate(inner, ctx)? {
            Evaluated::Scalar(v) => Evaluated::Scalar(-v),
            Evaluated::Column(vs) => Evaluated::Column(vs.into_iter().map(|v| -v).collect()),
        }),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(match (left, right) {
                (Evaluated::Scalar(a), Evaluated::Scalar(b)) => Evaluated::Scalar(op.apply(a, b)),
                (Evaluated::Column(a), Evaluated::Scalar(b)) => {
                    Evaluated::Column(a.into_iter().map(|x| op.apply(x, b)).collect())
                }
                (Evaluated::Scalar(a), Evaluated::Column(b)) => {
                    Evaluated::Column(b.into_iter().map(|y| op.apply(a, y)).collect())
                }
                (Evaluated::Column(a), Evaluated::Column(b)) => Evaluated::Column(
                    a.into_iter().zip(b).map(|(x, y)| op.apply(x, y)).collect(),
                ),
            })
        }
    }
}
