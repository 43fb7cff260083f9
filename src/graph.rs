use crate::ir::{AggregationMode, Chart, ChartData, ChartKind, ChartLabels, HeatmapGrid, PlotSeries, ViolinShape};
use crate::scale::{format_axis_value, padded_range, tick_step};
use crate::stats::Regression;
use crate::{OutputFormat, RenderOptions};
use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

/// Category colours, cycled when there are more slices than entries
const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

const SERIES_COLOR: RGBColor = PALETTE[0];
const FIT_COLOR: RGBColor = PALETTE[3];

/// Draw a chart and encode it as PNG or SVG bytes
pub fn render(chart: &Chart, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 {
        bail!("Image size must be positive (got {}x{})", width, height);
    }

    match options.format {
        OutputFormat::Png => {
            let mut buffer = vec![0u8; width as usize * height as usize * 3];
            {
                let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
                draw_chart(&root, chart)?;
                root.present().context("Failed to present drawing")?;
            }
            encode_png(&buffer, width, height)
        }
        OutputFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
                draw_chart(&root, chart)?;
                root.present().context("Failed to present drawing")?;
            }
            Ok(svg.into_bytes())
        }
    }
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }
    Ok(png_bytes)
}

fn draw_chart<DB>(root: &DrawingArea<DB, Shift>, chart: &Chart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match (&chart.data, chart.kind) {
        (ChartData::Series(series), ChartKind::Pie) => draw_pie(root, &chart.labels, series),
        (ChartData::Series(series), kind) => {
            if series.mode == AggregationMode::Continuous && series.x.is_numeric() {
                draw_continuous(root, &chart.labels, series, kind)
            } else {
                draw_indexed(root, &chart.labels, series, kind)
            }
        }
        (ChartData::Heatmap(grid), _) => draw_heatmap(root, &chart.labels, grid),
        (ChartData::Violins(shapes), _) => draw_violins(root, &chart.labels, shapes),
        (ChartData::Regression { x, y, fit }, _) => draw_regression(root, &chart.labels, x, y, fit),
    }
}

/// Label for the category at `x` when `x` sits on a shown tick
fn category_label(labels: &[String], x: f64, step: usize) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    let idx = idx as usize;
    if idx < labels.len() && idx % step == 0 {
        labels[idx].clone()
    } else {
        String::new()
    }
}

/// Line or bar chart over category positions 0..n
fn draw_indexed<DB>(
    root: &DrawingArea<DB, Shift>,
    labels: &ChartLabels,
    series: &PlotSeries,
    kind: ChartKind,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let categories = series.x.labels();
    let y_data = series.y_numbers();
    let is_bar = kind == ChartKind::Bar;

    let Some((y_min, y_max)) = padded_range(&y_data, is_bar) else {
        bail!("Cannot create chart with no data points");
    };
    let n = categories.len();
    let step = tick_step(n);
    let y_span = y_max - y_min;

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&labels.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .x_labels((n / step).clamp(1, 30))
        .x_label_formatter(&|x| category_label(&categories, *x, step))
        .y_label_formatter(&|y| format_axis_value(*y, y_span))
        .draw()
        .context("Failed to draw mesh")?;

    let points: Vec<(f64, f64)> = y_data
        .iter()
        .enumerate()
        .filter(|(_, y)| y.is_finite())
        .map(|(i, &y)| (i as f64, y))
        .collect();

    if is_bar {
        chart
            .draw_series(points.iter().map(|&(x, y)| {
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], SERIES_COLOR.filled())
            }))
            .context("Failed to draw bars")?;
    } else {
        chart
            .draw_series(LineSeries::new(points.clone(), SERIES_COLOR.stroke_width(2)))
            .context("Failed to draw line series")?;
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 3, SERIES_COLOR.filled())))
            .context("Failed to draw points")?;
    }

    Ok(())
}

/// Line or bar chart with a numeric X axis
fn draw_continuous<DB>(
    root: &DrawingArea<DB, Shift>,
    labels: &ChartLabels,
    series: &PlotSeries,
    kind: ChartKind,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let points: Vec<(f64, f64)> = series
        .pairs()
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.is_empty() {
        bail!("Cannot create chart with no data points");
    }

    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let is_bar = kind == ChartKind::Bar;
    let (x_min, x_max) = padded_range(&xs, false).context("No finite X values")?;
    let (y_min, y_max) = padded_range(&ys, is_bar).context("No finite Y values")?;
    let (x_span, y_span) = (x_max - x_min, y_max - y_min);

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&labels.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .x_label_formatter(&|x| format_axis_value(*x, x_span))
        .y_label_formatter(&|y| format_axis_value(*y, y_span))
        .draw()
        .context("Failed to draw mesh")?;

    if is_bar {
        let width = 0.8 * smallest_gap(&xs);
        chart
            .draw_series(points.iter().map(|&(x, y)| {
                Rectangle::new([(x - width / 2.0, 0.0), (x + width / 2.0, y)], SERIES_COLOR.filled())
            }))
            .context("Failed to draw bars")?;
    } else {
        chart
            .draw_series(LineSeries::new(points, SERIES_COLOR.stroke_width(2)))
            .context("Failed to draw line series")?;
    }

    Ok(())
}

/// Smallest positive distance between distinct X values, 1.0 if there is none
fn smallest_gap(xs: &[f64]) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|d| *d > 0.0)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
        .unwrap_or(1.0)
}

/// Pie chart drawn from polygons, starting at 12 o'clock and running clockwise
fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, labels: &ChartLabels, series: &PlotSeries) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    // negative and missing slices cannot be drawn
    let slices: Vec<(String, f64)> = series
        .x
        .labels()
        .into_iter()
        .zip(series.y_numbers())
        .filter(|(_, v)| v.is_finite() && *v > 0.0)
        .collect();
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    if slices.is_empty() || total <= 0.0 {
        bail!("Cannot create pie chart without positive values");
    }

    let area = root
        .titled(&labels.title, ("sans-serif", 20))
        .context("Failed to draw title")?;
    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.35;
    let at = |angle: f64, r: f64| -> (i32, i32) {
        (
            (center.0 + r * angle.cos()).round() as i32,
            (center.1 - r * angle.sin()).round() as i32,
        )
    };

    let centered = Pos::new(HPos::Center, VPos::Center);
    let mut start = PI / 2.0;
    for (i, (label, value)) in slices.iter().enumerate() {
        let share = value / total;
        let sweep = 2.0 * PI * share;
        let steps = ((sweep.to_degrees()).ceil() as usize).max(2);

        let mut outline = vec![at(0.0, 0.0)];
        outline.extend((0..=steps).map(|k| at(start - sweep * k as f64 / steps as f64, radius)));
        let color = PALETTE[i % PALETTE.len()];
        area.draw(&Polygon::new(outline, color.filled()))
            .context("Failed to draw pie slice")?;

        let mid = start - sweep / 2.0;
        let pct_style = ("sans-serif", 14).into_font().color(&WHITE).pos(centered);
        area.draw(&Text::new(format!("{:.1}%", share * 100.0), at(mid, radius * 0.6), pct_style))
            .context("Failed to draw slice percentage")?;

        let side = if mid.cos() >= 0.0 { HPos::Left } else { HPos::Right };
        let label_style = ("sans-serif", 14).into_font().color(&BLACK).pos(Pos::new(side, VPos::Center));
        area.draw(&Text::new(label.clone(), at(mid, radius * 1.1), label_style))
            .context("Failed to draw slice label")?;

        start -= sweep;
    }

    Ok(())
}

/// Blend through a yellow-green-blue ramp, `t` in 0..1
fn heat_color(t: f64) -> RGBColor {
    const STOPS: [(f64, (f64, f64, f64)); 3] = [
        (0.0, (255.0, 255.0, 217.0)),
        (0.5, (65.0, 182.0, 196.0)),
        (1.0, (8.0, 29.0, 88.0)),
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let (lo, hi) = if t <= 0.5 { (STOPS[0], STOPS[1]) } else { (STOPS[1], STOPS[2]) };
    let f = (t - lo.0) / (hi.0 - lo.0);
    let mix = |a: f64, b: f64| (a + (b - a) * f).round() as u8;
    RGBColor(mix(lo.1 .0, hi.1 .0), mix(lo.1 .1, hi.1 .1), mix(lo.1 .2, hi.1 .2))
}

/// Annotated grid; the first Y label is the top row
fn draw_heatmap<DB>(root: &DrawingArea<DB, Shift>, labels: &ChartLabels, grid: &HeatmapGrid) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if grid.is_empty() {
        bail!("Cannot create heatmap with no data points");
    }

    let nx = grid.x_labels.len();
    let ny = grid.y_labels.len();
    let finite = grid.cells.iter().flatten().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&labels.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5..(nx as f64 - 0.5), -0.5..(ny as f64 - 0.5))
        .context("Failed to build chart")?;

    let x_step = tick_step(nx);
    let y_step = tick_step(ny);
    let y_labels: Vec<String> = grid.y_labels.iter().rev().cloned().collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .x_labels(nx.clamp(1, 30))
        .y_labels(ny.clamp(1, 30))
        .x_label_formatter(&|x| category_label(&grid.x_labels, *x, x_step))
        .y_label_formatter(&|y| category_label(&y_labels, *y, y_step))
        .draw()
        .context("Failed to draw mesh")?;

    for (r, row) in grid.cells.iter().enumerate() {
        let y = (ny - 1 - r) as f64;
        for (c, &value) in row.iter().enumerate() {
            let x = c as f64;
            let t = (value - lo) / range;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    heat_color(t).filled(),
                )))
                .context("Failed to draw cell")?;

            let ink = if t > 0.6 { WHITE } else { BLACK };
            let style = ("sans-serif", 12)
                .into_font()
                .color(&ink)
                .pos(Pos::new(HPos::Center, VPos::Center));
            chart
                .draw_series(std::iter::once(Text::new(format!("{:.0}", value), (x, y), style)))
                .context("Failed to draw cell annotation")?;
        }
    }

    Ok(())
}

/// Mirrored density outlines with an interquartile box and median marker
fn draw_violins<DB>(root: &DrawingArea<DB, Shift>, labels: &ChartLabels, shapes: &[ViolinShape]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let all: Vec<f64> = shapes.iter().flat_map(|s| s.grid.iter().copied()).collect();
    let Some((y_min, y_max)) = padded_range(&all, false) else {
        bail!("Cannot create violin plot with no data points");
    };
    let n = shapes.len();
    let categories: Vec<String> = shapes.iter().map(|s| s.label.clone()).collect();
    let step = tick_step(n);
    let y_span = y_max - y_min;

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&labels.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .x_labels(n.clamp(1, 30))
        .x_label_formatter(&|x| category_label(&categories, *x, step))
        .y_label_formatter(&|y| format_axis_value(*y, y_span))
        .draw()
        .context("Failed to draw mesh")?;

    const HALF_WIDTH: f64 = 0.4;
    for (i, shape) in shapes.iter().enumerate() {
        let cx = i as f64;
        let color = PALETTE[i % PALETTE.len()];

        let mut outline: Vec<(f64, f64)> = shape
            .grid
            .iter()
            .zip(&shape.density)
            .map(|(&y, &d)| (cx - HALF_WIDTH * d, y))
            .collect();
        outline.extend(
            shape
                .grid
                .iter()
                .zip(&shape.density)
                .rev()
                .map(|(&y, &d)| (cx + HALF_WIDTH * d, y)),
        );
        chart
            .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.7).filled())))
            .context("Failed to draw violin")?;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - 0.03, shape.q1), (cx + 0.03, shape.q3)],
                BLACK.filled(),
            )))
            .context("Failed to draw quartile box")?;
        chart
            .draw_series(std::iter::once(Circle::new((cx, shape.median), 3, WHITE.filled())))
            .context("Failed to draw median")?;
    }

    Ok(())
}

/// Scatter of the observations with the fitted line on top
fn draw_regression<DB>(
    root: &DrawingArea<DB, Shift>,
    labels: &ChartLabels,
    x: &[f64],
    y: &[f64],
    fit: &Regression,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x_min, x_max) = padded_range(x, false).context("Cannot create chart with no data points")?;
    let (y_min, y_max) = padded_range(y, false).context("Cannot create chart with no data points")?;
    let (x_span, y_span) = (x_max - x_min, y_max - y_min);

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&labels.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_desc(labels.x.as_str())
        .y_desc(labels.y.as_str())
        .x_label_formatter(&|v| format_axis_value(*v, x_span))
        .y_label_formatter(&|v| format_axis_value(*v, y_span))
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(
            x.iter()
                .zip(y)
                .map(|(&a, &b)| Circle::new((a, b), 3, SERIES_COLOR.mix(0.7).filled())),
        )
        .context("Failed to draw points")?
        .label("Data")
        .legend(|(lx, ly)| Circle::new((lx + 10, ly), 3, SERIES_COLOR.filled()));

    let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    chart
        .draw_series(LineSeries::new(
            vec![(lo, fit.predict(lo)), (hi, fit.predict(hi))],
            FIT_COLOR.stroke_width(2),
        ))
        .context("Failed to draw regression line")?
        .label("Regression line")
        .legend(|(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], FIT_COLOR.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .context("Failed to draw legend")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{SemanticType, Series, Value};
    use crate::stats::linear_regression;

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    fn labels() -> ChartLabels {
        ChartLabels {
            title: "Test".into(),
            x: "X".into(),
            y: "Y".into(),
        }
    }

    fn region_sales() -> PlotSeries {
        PlotSeries {
            mode: AggregationMode::Categorical,
            x: Series::new(
                "Region",
                SemanticType::Categorical,
                vec![Value::Text("East".into()), Value::Text("West".into())],
            ),
            y: Series::numeric("Sales", vec![125.0, 50.0]),
        }
    }

    fn chart(kind: ChartKind, data: ChartData) -> Chart {
        Chart { kind, labels: labels(), data }
    }

    #[test]
    fn test_render_bar_png() {
        let bytes = render(&chart(ChartKind::Bar, ChartData::Series(region_sales())), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_render_line_svg() {
        let options = RenderOptions {
            format: OutputFormat::Svg,
            ..RenderOptions::default()
        };
        let bytes = render(&chart(ChartKind::Line, ChartData::Series(region_sales())), &options).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<svg"));
    }

    #[test]
    fn test_render_pie() {
        let bytes = render(&chart(ChartKind::Pie, ChartData::Series(region_sales())), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_render_pie_rejects_non_positive() {
        let mut series = region_sales();
        series.y = Series::numeric("Sales", vec![0.0, -3.0]);
        assert!(render(&chart(ChartKind::Pie, ChartData::Series(series)), &RenderOptions::default()).is_err());
    }

    #[test]
    fn test_render_empty_series_fails() {
        let series = PlotSeries {
            mode: AggregationMode::Categorical,
            x: Series::new("k", SemanticType::Categorical, vec![]),
            y: Series::numeric("v", vec![]),
        };
        assert!(render(&chart(ChartKind::Line, ChartData::Series(series)), &RenderOptions::default()).is_err());
    }

    #[test]
    fn test_render_heatmap() {
        let grid = HeatmapGrid {
            x_labels: vec!["Jan".into(), "Feb".into()],
            y_labels: vec!["East".into(), "West".into()],
            cells: vec![vec![9.0, 2.0], vec![4.0, 0.0]],
        };
        let bytes = render(&chart(ChartKind::Heatmap, ChartData::Heatmap(grid)), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_render_regression() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = vec![2.0, 4.1, 5.9, 8.2];
        let fit = linear_regression(&x, &y).unwrap();
        let data = ChartData::Regression { x, y, fit };
        let bytes = render(&chart(ChartKind::Regression, data), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_zero_size_rejected() {
        let options = RenderOptions {
            width: 0,
            ..RenderOptions::default()
        };
        assert!(render(&chart(ChartKind::Bar, ChartData::Series(region_sales())), &options).is_err());
    }

    #[test]
    fn test_category_label_only_on_ticks() {
        let labels: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(category_label(&labels, 1.0, 1), "b");
        assert_eq!(category_label(&labels, 1.5, 1), "");
        assert_eq!(category_label(&labels, 1.0, 2), "");
        assert_eq!(category_label(&labels, 5.0, 1), "");
    }

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(255, 255, 217));
        assert_eq!(heat_color(1.0), RGBColor(8, 29, 88));
        assert_eq!(heat_color(f64::NAN), RGBColor(255, 255, 217));
    }
}
