// Query runtime: session state and end-to-end execution of one query

use crate::catalog::{pick, FieldCatalog};
use crate::csv_reader;
use crate::data::Dataset;
use crate::dates::{DateFieldCache, DateFormat};
use crate::error::{EngineError, EngineResult};
use crate::filter::{filter_by_date, FilterCriteria};
use crate::ir::{AggregationMode, Chart, ChartData, ChartKind, ChartLabels, PlotSeries};
use crate::resolve::{resolve_field, resolve_numeric_field, ResolveContext};
use crate::scale::scale;
use crate::stats::{linear_regression, violin_shapes, Regression};
use crate::transform::{plan, plan_distribution, plan_heatmap, plan_pairs};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

/// Date handling chosen for a query: the format, and optionally a detected
/// date field to filter on.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSelection {
    pub format: DateFormat,
    /// Detected date field, by 1-based number or exact name
    pub field: Option<String>,
    pub criteria: FilterCriteria,
}

/// One chart or regression request
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub chart: ChartKind,
    pub x: String,
    pub y: String,
    /// Cell values, heatmaps only
    pub value: Option<String>,
    pub dates: Option<DateSelection>,
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
}

impl Query {
    pub fn new(chart: ChartKind, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            chart,
            x: x.into(),
            y: y.into(),
            value: None,
            dates: None,
            title: None,
            x_label: None,
            y_label: None,
        }
    }
}

/// Rows left after date filtering, with the date fields known for them
#[derive(Debug, Clone)]
pub struct View {
    pub data: Dataset,
    pub date_fields: Vec<String>,
    pub warnings: Vec<EngineError>,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub chart: Chart,
    pub regression: Option<Regression>,
    /// Rows the fields were resolved against
    pub rows: usize,
    /// Recoverable conditions met along the way
    pub warnings: Vec<EngineError>,
}

/// Catalog summary for the `fields` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldListing {
    pub fields: Vec<String>,
    pub date_format: Option<String>,
    pub date_fields: Vec<String>,
}

/// A loaded dataset plus detection results remembered across queries
#[derive(Debug)]
pub struct Session {
    dataset: Dataset,
    date_cache: DateFieldCache,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            date_cache: DateFieldCache::new(),
        }
    }

    /// Load a dataset from a path, `-` for stdin
    pub fn load(path: &str) -> Result<Self> {
        let dataset = csv_reader::load_dataset(path)
            .with_context(|| format!("Failed to load data from '{}'", path))?;
        Ok(Self::new(dataset))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn catalog(&self) -> FieldCatalog {
        FieldCatalog::from_dataset(&self.dataset)
    }

    /// Columns detected as dates under `format`, cached per format
    pub fn date_fields(&mut self, format: &DateFormat) -> EngineResult<Vec<String>> {
        let fields = self.date_cache.get_or_detect(&self.dataset, format).to_vec();
        if fields.is_empty() {
            return Err(EngineError::NoDateFieldsDetected(format.to_string()));
        }
        info!("Detected date fields for '{}': {}", format, fields.join(", "));
        Ok(fields)
    }

    pub fn listing(&mut self, format: Option<&DateFormat>) -> FieldListing {
        let date_fields = match format {
            Some(f) => self.date_fields(f).unwrap_or_default(),
            None => Vec::new(),
        };
        FieldListing {
            fields: self.dataset.headers().to_vec(),
            date_format: format.map(|f| f.to_string()),
            date_fields,
        }
    }

    /// Apply the date selection. Every problem here is recoverable: it is
    /// logged, recorded in the view's warnings and the rows stay unfiltered
    /// (or empty, for a filter that matches nothing).
    pub fn view(&mut self, dates: Option<&DateSelection>) -> EngineResult<View> {
        let mut warnings = Vec::new();

        let Some(selection) = dates else {
            return Ok(View {
                data: self.dataset.clone(),
                date_fields: Vec::new(),
                warnings,
            });
        };

        let detected = self
            .date_cache
            .get_or_detect(&self.dataset, &selection.format)
            .to_vec();

        let column = if detected.is_empty() {
            let e = EngineError::NoDateFieldsDetected(selection.format.to_string());
            warn!("{}; proceeding without a date filter", e);
            warnings.push(e);
            None
        } else {
            match &selection.field {
                Some(input) => {
                    let picked = pick(&detected, input).map(str::to_string);
                    if picked.is_none() {
                        let e = EngineError::InvalidFilterSelection(format!(
                            "'{}' is not a detected date field",
                            input
                        ));
                        warn!("{}; proceeding without a date filter", e);
                        warnings.push(e);
                    }
                    picked
                }
                None if selection.criteria.is_none() => None,
                None => {
                    let e = EngineError::InvalidFilterSelection(
                        "a date filter needs a date field".to_string(),
                    );
                    warn!("{}; proceeding without a date filter", e);
                    warnings.push(e);
                    None
                }
            }
        };

        let data = match column {
            Some(column) => {
                let filtered =
                    filter_by_date(&self.dataset, &column, &selection.format, &selection.criteria)?;
                warnings.extend(filtered.warnings);
                filtered.data
            }
            None => self.dataset.clone(),
        };

        Ok(View {
            data,
            date_fields: detected,
            warnings,
        })
    }

    /// Filter once, resolve every field against that one view, then plan the chart
    pub fn run(&mut self, query: &Query) -> Result<QueryResult> {
        let view = self.view(query.dates.as_ref())?;
        let format = query.dates.as_ref().map(|d| &d.format);

        let mut ctx = ResolveContext::new(&view.data);
        if let Some(f) = format {
            ctx = ctx.with_dates(f, &view.date_fields);
        }

        let x = resolve_field(&query.x, &ctx)?;
        let y = resolve_field(&query.y, &ctx)?;

        let title = query
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| query.chart.default_title(&query.x, &query.y, query.value.as_deref()));
        let mut regression = None;

        let (data, x_caption, y_caption) = match query.chart {
            ChartKind::Line | ChartKind::Bar | ChartKind::Pie => {
                let plotted = plan(&x, &y, format)?;
                let (y_scaled, y_suffix) = scale(&plotted.y);
                let (x_scaled, x_suffix) = match plotted.mode {
                    AggregationMode::Continuous => scale(&plotted.x),
                    AggregationMode::Categorical => (plotted.x.clone(), ""),
                };
                let data = ChartData::Series(PlotSeries {
                    mode: plotted.mode,
                    x: x_scaled,
                    y: y_scaled,
                });
                (
                    data,
                    caption(query.x_label.as_deref(), &query.x, x_suffix),
                    caption(query.y_label.as_deref(), &query.y, y_suffix),
                )
            }
            ChartKind::Heatmap => {
                let raw_value = query
                    .value
                    .as_deref()
                    .context("A heatmap needs a value field")?;
                let value = resolve_numeric_field(raw_value, &ctx)?;
                let grid = plan_heatmap(&x, &y, &value, format)?;
                (
                    ChartData::Heatmap(grid),
                    caption(query.x_label.as_deref(), &query.x, ""),
                    caption(query.y_label.as_deref(), &query.y, ""),
                )
            }
            ChartKind::Violin => {
                let groups = plan_distribution(&x, &y, format)?;
                (
                    ChartData::Violins(violin_shapes(&groups)),
                    caption(query.x_label.as_deref(), &query.x, ""),
                    caption(query.y_label.as_deref(), &query.y, ""),
                )
            }
            ChartKind::Regression => {
                let (xs, ys) = plan_pairs(&x, &y)?;
                let fit = linear_regression(&xs, &ys).context("Regression failed")?;
                regression = Some(fit.clone());
                (
                    ChartData::Regression { x: xs, y: ys, fit },
                    caption(query.x_label.as_deref(), &query.x, ""),
                    caption(query.y_label.as_deref(), &query.y, ""),
                )
            }
        };

        Ok(QueryResult {
            chart: Chart {
                kind: query.chart,
                labels: ChartLabels {
                    title,
                    x: x_caption,
                    y: y_caption,
                },
                data,
            },
            regression,
            rows: view.data.row_count(),
            warnings: view.warnings,
        })
    }
}

/// Axis caption: the custom label or the raw field text, plus any scale suffix
fn caption(custom: Option<&str>, raw: &str, suffix: &str) -> String {
    let base = custom.filter(|c| !c.trim().is_empty()).unwrap_or(raw);
    if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{} {}", base, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let rows = [
            ["2024-01-05", "East", "1200000"],
            ["2024-01-20", "West", "800000"],
            ["2024-02-03", "East", "500000"],
            ["2023-12-30", "West", "100"],
        ];
        Session::new(Dataset::new(
            vec!["Date".into(), "Region".into(), "Sales".into()],
            rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        ))
    }

    fn ymd() -> DateFormat {
        DateFormat::Pattern("%Y-%m-%d".into())
    }

    fn series(result: &QueryResult) -> &PlotSeries {
        match &result.chart.data {
            ChartData::Series(s) => s,
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn test_bar_query_groups_and_scales() {
        let mut s = session();
        let result = s.run(&Query::new(ChartKind::Bar, "Region", "Sales")).unwrap();
        let plotted = series(&result);
        assert_eq!(plotted.x.labels(), vec!["East", "West"]);
        assert_eq!(plotted.y_numbers(), vec![1.7, 0.8001]);
        assert_eq!(result.chart.labels.y, "Sales ('M)");
        assert_eq!(result.chart.labels.x, "Region");
        assert_eq!(result.chart.labels.title, "Bar plot: Sales vs Region");
    }

    #[test]
    fn test_year_filter_applies_before_resolution() {
        let mut s = session();
        let mut query = Query::new(ChartKind::Line, "2", "3");
        query.dates = Some(DateSelection {
            format: ymd(),
            field: Some("1".into()),
            criteria: FilterCriteria::Year { year: 2024 },
        });
        let result = s.run(&query).unwrap();
        assert_eq!(result.rows, 3);
        assert!(result.warnings.is_empty());
        assert_eq!(series(&result).y_numbers(), vec![1.7, 0.8]);
    }

    #[test]
    fn test_empty_filter_is_reported_not_fatal() {
        let mut s = session();
        let mut query = Query::new(ChartKind::Line, "Region", "Sales");
        query.dates = Some(DateSelection {
            format: ymd(),
            field: Some("Date".into()),
            criteria: FilterCriteria::Year { year: 1999 },
        });
        let result = s.run(&query).unwrap();
        assert_eq!(result.rows, 0);
        assert!(series(&result).is_empty());
        assert!(result.warnings.contains(&EngineError::EmptyFilterResult));
    }

    #[test]
    fn test_unknown_date_field_skips_filter() {
        let mut s = session();
        let view = s
            .view(Some(&DateSelection {
                format: ymd(),
                field: Some("Ship Date".into()),
                criteria: FilterCriteria::Year { year: 2024 },
            }))
            .unwrap();
        assert_eq!(view.data.row_count(), 4);
        assert!(matches!(view.warnings[0], EngineError::InvalidFilterSelection(_)));
    }

    #[test]
    fn test_no_date_fields_detected() {
        let mut s = session();
        assert_eq!(
            s.date_fields(&DateFormat::Pattern("%d/%m/%Y".into())),
            Err(EngineError::NoDateFieldsDetected("%d/%m/%Y".into()))
        );
        let view = s
            .view(Some(&DateSelection {
                format: DateFormat::Pattern("%d/%m/%Y".into()),
                field: Some("1".into()),
                criteria: FilterCriteria::Year { year: 2024 },
            }))
            .unwrap();
        assert_eq!(view.data.row_count(), 4);
        assert_eq!(view.warnings.len(), 1);
    }

    #[test]
    fn test_date_x_sorted_chronologically() {
        let mut s = session();
        let mut query = Query::new(ChartKind::Line, "Date", "Sales");
        query.dates = Some(DateSelection {
            format: ymd(),
            field: None,
            criteria: FilterCriteria::None,
        });
        let result = s.run(&query).unwrap();
        assert_eq!(
            series(&result).x.labels(),
            vec!["2023-12-30", "2024-01-05", "2024-01-20", "2024-02-03"]
        );
    }

    #[test]
    fn test_epoch_filter_keeps_numeric_fields_usable() {
        // 2024-01-01, 2024-02-01 and 2023-06-01 as epoch seconds
        let rows = [
            ["1704067200", "1200", "East"],
            ["1706745600", "800", "West"],
            ["1685577600", "500", "East"],
        ];
        let mut s = Session::new(Dataset::new(
            vec!["ts".into(), "Sales".into(), "Region".into()],
            rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        ));
        assert_eq!(s.date_fields(&DateFormat::Epoch).unwrap(), vec!["ts", "Sales"]);

        let mut query = Query::new(ChartKind::Bar, "Region", "Sales");
        query.dates = Some(DateSelection {
            format: DateFormat::Epoch,
            field: Some("ts".into()),
            criteria: FilterCriteria::Year { year: 2024 },
        });
        let result = s.run(&query).unwrap();
        assert_eq!(result.rows, 2);
        assert_eq!(series(&result).y_numbers(), vec![1.2, 0.8]);

        query.y = "2*2".into();
        assert!(s.run(&query).is_ok());

        let mut fit = Query::new(ChartKind::Regression, "1", "Sales");
        fit.dates = query.dates.clone();
        fit.dates.as_mut().unwrap().criteria = FilterCriteria::None;
        assert_eq!(s.run(&fit).unwrap().regression.unwrap().n, 3);
    }

    #[test]
    fn test_heatmap_requires_value() {
        let mut s = session();
        assert!(s.run(&Query::new(ChartKind::Heatmap, "Region", "Date")).is_err());

        let mut query = Query::new(ChartKind::Heatmap, "Region", "Date");
        query.value = Some("Sales".into());
        let result = s.run(&query).unwrap();
        assert_eq!(result.chart.labels.title, "Heatmap: Sales by Date vs Region");
    }

    #[test]
    fn test_regression_query() {
        let data = Dataset::new(
            vec!["x".into(), "y".into()],
            vec![
                vec!["1".into(), "3".into()],
                vec!["2".into(), "5".into()],
                vec!["3".into(), "".into()],
                vec!["4".into(), "9".into()],
            ],
        );
        let mut s = Session::new(data);
        let result = s.run(&Query::new(ChartKind::Regression, "x", "y")).unwrap();
        let fit = result.regression.unwrap();
        assert_eq!(fit.n, 3);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert_eq!(result.chart.labels.title, "Linear Regression");
    }

    #[test]
    fn test_listing() {
        let mut s = session();
        let listing = s.listing(Some(&ymd()));
        assert_eq!(listing.fields, vec!["Date", "Region", "Sales"]);
        assert_eq!(listing.date_fields, vec!["Date"]);
        assert_eq!(listing.date_format.as_deref(), Some("%Y-%m-%d"));
    }

    #[test]
    fn test_custom_labels_keep_suffix() {
        assert_eq!(caption(Some("Revenue"), "3", "('000)"), "Revenue ('000)");
        assert_eq!(caption(Some("  "), "3", ""), "3");
    }
}
