use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;

/// Semantic classification of a resolved series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Datetime,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
            SemanticType::Datetime => "datetime",
        };
        f.write_str(name)
    }
}

/// A single cell of a resolved series
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Display label, also used as the grouping key
    pub fn label(&self) -> String {
        match self {
            Value::Missing => "NaN".to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Date(d) => {
                if d.hour() == 0 && d.minute() == 0 && d.second() == 0 {
                    d.format("%Y-%m-%d").to_string()
                } else {
                    d.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }
}

/// Integral values print without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Values aligned to the rows of the dataset view they were resolved from,
/// tagged once with their semantic type.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub kind: SemanticType,
    pub values: Vec<Value>,
}

impl Series {
    pub fn new(name: impl Into<String>, kind: SemanticType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Numeric series; NaN becomes a missing cell
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_nan() { Value::Missing } else { Value::Number(v) })
            .collect();
        Self::new(name, SemanticType::Numeric, values)
    }

    pub fn constant(name: impl Into<String>, value: f64, len: usize) -> Self {
        Self::numeric(name, vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == SemanticType::Numeric
    }

    /// Numbers as f64 with missing cells as NaN; `None` for non-numeric series
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        if !self.is_numeric() {
            return None;
        }
        Some(
            self.values
                .iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    pub fn labels(&self) -> Vec<String> {
        self.values.iter().map(Value::label).collect()
    }

    /// Number of distinct non-missing values
    pub fn distinct_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for v in self.values.iter().filter(|v| !v.is_missing()) {
            seen.insert(v.label());
        }
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_numeric_nan_is_missing() {
        let s = Series::numeric("v", vec![1.0, f64::NAN]);
        assert_eq!(s.values, vec![Value::Number(1.0), Value::Missing]);
        let back = s.to_f64().unwrap();
        assert!(back[1].is_nan());
    }

    #[test]
    fn test_labels() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Value::Date(d.and_hms_opt(0, 0, 0).unwrap()).label(), "2024-03-01");
        assert_eq!(Value::Date(d.and_hms_opt(9, 30, 0).unwrap()).label(), "2024-03-01 09:30:00");
        assert_eq!(Value::Number(2024.0).label(), "2024");
        assert_eq!(Value::Number(2.5).label(), "2.5");
        assert_eq!(Value::Missing.label(), "NaN");
    }

    #[test]
    fn test_distinct_count() {
        let s = Series::new(
            "c",
            SemanticType::Categorical,
            vec![Value::Text("a".into()), Value::Text("b".into()), Value::Text("a".into()), Value::Missing],
        );
        assert_eq!(s.distinct_count(), 2);
        assert!(s.to_f64().is_none());
    }
}
