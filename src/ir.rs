use crate::series::{Series, Value};
use crate::stats::Regression;
use std::fmt;

// =============================================================================
// Planner output
// =============================================================================

/// How the X axis of a series was treated by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Grouped by X with Y summed per group
    Categorical,
    /// Row-wise pairs, possibly sorted by date
    Continuous,
}

/// Ordered (x, y) pairs ready for scaling and rendering.
/// `x` and `y` always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub mode: AggregationMode,
    pub x: Series,
    pub y: Series,
}

impl PlotSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.x.values.iter().zip(self.y.values.iter())
    }

    /// Y values as f64, missing cells as NaN
    pub fn y_numbers(&self) -> Vec<f64> {
        self.y
            .values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    }
}

/// Pivoted sums: one row per distinct Y, one column per distinct X
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapGrid {
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    /// `cells[row][col]`, rows following `y_labels`
    pub cells: Vec<Vec<f64>>,
}

impl HeatmapGrid {
    pub fn is_empty(&self) -> bool {
        self.x_labels.is_empty() || self.y_labels.is_empty()
    }
}

/// Numeric values collected for one category
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub label: String,
    pub values: Vec<f64>,
}

/// Density outline and summary of one violin
#[derive(Debug, Clone, PartialEq)]
pub struct ViolinShape {
    pub label: String,
    /// Value positions of the density curve
    pub grid: Vec<f64>,
    /// Density at each grid point, normalised to 0..1
    pub density: Vec<f64>,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

// =============================================================================
// Chart description
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Heatmap,
    Violin,
    Regression,
}

impl ChartKind {
    /// Default title built from the raw field specifications
    pub fn default_title(&self, x: &str, y: &str, value: Option<&str>) -> String {
        match self {
            ChartKind::Line => format!("Line plot: {} vs {}", y, x),
            ChartKind::Bar => format!("Bar plot: {} vs {}", y, x),
            ChartKind::Pie => format!("Pie chart: {} by {}", y, x),
            ChartKind::Heatmap => format!("Heatmap: {} by {} vs {}", value.unwrap_or(""), y, x),
            ChartKind::Violin => format!("Violin plot: {} by {}", y, x),
            ChartKind::Regression => "Linear Regression".to_string(),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Violin => "violin",
            ChartKind::Regression => "regression",
        };
        f.write_str(name)
    }
}

/// Final title and axis captions, scale suffixes included
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartLabels {
    pub title: String,
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Series(PlotSeries),
    Heatmap(HeatmapGrid),
    Violins(Vec<ViolinShape>),
    Regression {
        x: Vec<f64>,
        y: Vec<f64>,
        fit: Regression,
    },
}

/// Everything the renderer needs to draw one chart
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub kind: ChartKind,
    pub labels: ChartLabels,
    pub data: ChartData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_titles() {
        assert_eq!(ChartKind::Line.default_title("Date", "Sales", None), "Line plot: Sales vs Date");
        assert_eq!(ChartKind::Pie.default_title("Region", "Sales", None), "Pie chart: Sales by Region");
        assert_eq!(
            ChartKind::Heatmap.default_title("Month", "Region", Some("Sales")),
            "Heatmap: Sales by Region vs Month"
        );
        assert_eq!(ChartKind::Regression.default_title("a", "b", None), "Linear Regression");
    }

    #[test]
    fn test_heatmap_empty_when_an_axis_is_empty() {
        let grid = HeatmapGrid {
            x_labels: vec!["a".into(), "b".into()],
            y_labels: vec!["r".into()],
            cells: vec![vec![-5.0, f64::NAN]],
        };
        assert!(!grid.is_empty());
        let empty = HeatmapGrid {
            x_labels: vec!["a".into()],
            y_labels: vec![],
            cells: vec![],
        };
        assert!(empty.is_empty());
    }
}
