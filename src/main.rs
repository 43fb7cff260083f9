use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fieldplot::dates::{DateFormat, DATE_FORMAT_PRESETS};
use fieldplot::filter::FilterCriteria;
use fieldplot::graph;
use fieldplot::ir::ChartKind;
use fieldplot::runtime::{DateSelection, Query, QueryResult, Session};
use fieldplot::RenderOptions;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fieldplot")]
#[command(about = "Resolve fields and formulas over tabular data, then plot or regress them", long_about = None)]
struct Cli {
    /// Log resolution and detection details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the dataset's fields and, with a date format, its detected date fields
    Fields {
        /// CSV, TXT or JSON file; '-' reads CSV from stdin
        file: String,
        /// Preset number (1-13), 'epoch' or a strftime pattern
        #[arg(long)]
        date_format: Option<String>,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a chart
    Plot {
        file: String,
        #[arg(long, value_enum)]
        chart: ChartArg,
        #[command(flatten)]
        fields: FieldArgs,
        /// Heatmap cell values
        #[arg(long)]
        value: Option<String>,
        #[command(flatten)]
        dates: DateArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fit a least-squares line of Y on X
    Regress {
        file: String,
        #[command(flatten)]
        fields: FieldArgs,
        #[command(flatten)]
        dates: DateArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChartArg {
    Line,
    Bar,
    Pie,
    Heatmap,
    Violin,
}

impl From<ChartArg> for ChartKind {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Line => ChartKind::Line,
            ChartArg::Bar => ChartKind::Bar,
            ChartArg::Pie => ChartKind::Pie,
            ChartArg::Heatmap => ChartKind::Heatmap,
            ChartArg::Violin => ChartKind::Violin,
        }
    }
}

const FIELD_HELP: &str = "Column name, 1-based column number, formula such as '3*4' or \
'[Unit Price] * Qty', or a constant. Every standalone digit run in a formula is read as a \
column number, so plain literals like '2' or '1.5' cannot appear inside a formula; only \
exponent forms glued to a letter, such as '15e0' or '25e2', are read as numbers";

/// Field specifications for the X and Y axes
#[derive(Args, Debug)]
struct FieldArgs {
    #[arg(long, help = FIELD_HELP)]
    x: String,
    #[arg(long, help = FIELD_HELP)]
    y: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    x_label: Option<String>,
    #[arg(long)]
    y_label: Option<String>,
}

#[derive(Args, Debug)]
struct DateArgs {
    /// Preset number (1-13), 'epoch' or a strftime pattern
    #[arg(long)]
    date_format: Option<String>,
    /// Detected date field to filter on, by number or name
    #[arg(long, requires = "date_format")]
    date_field: Option<String>,
    #[arg(long, requires = "date_field")]
    year: Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
    /// Weekday name, e.g. Monday
    #[arg(long, requires = "year")]
    weekday: Option<String>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output file; `.svg` selects SVG. Charts go to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Render options as JSON, e.g. '{"width": 1024, "height": 768, "type": "svg"}'
    #[arg(long)]
    options: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fields { file, date_format, json } => run_fields(&file, date_format.as_deref(), json),
        Command::Plot {
            file,
            chart,
            fields,
            value,
            dates,
            output,
        } => {
            let mut query = build_query(chart.into(), fields, &dates)?;
            query.value = value;
            let mut session = Session::load(&file)?;
            let result = session.run(&query)?;
            write_chart(&result, &output, true)
        }
        Command::Regress {
            file,
            fields,
            dates,
            output,
            json,
        } => {
            let query = build_query(ChartKind::Regression, fields, &dates)?;
            let mut session = Session::load(&file)?;
            let result = session.run(&query)?;
            print_regression(&result, &query, json)?;
            write_chart(&result, &output, false)
        }
    }
}

/// Logs go to stderr so stdout stays free for image bytes
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn parse_date_format(choice: &str) -> Result<DateFormat> {
    match DateFormat::from_choice(choice) {
        Some(format) => Ok(format),
        None => bail!(
            "Invalid date format '{}'. Choose 1-{}, 'epoch' or a custom pattern",
            choice,
            DATE_FORMAT_PRESETS.len()
        ),
    }
}

fn build_query(chart: ChartKind, fields: FieldArgs, dates: &DateArgs) -> Result<Query> {
    let mut query = Query::new(chart, fields.x, fields.y);
    query.title = fields.title;
    query.x_label = fields.x_label;
    query.y_label = fields.y_label;

    if let Some(choice) = &dates.date_format {
        let criteria = FilterCriteria::from_parts(dates.year, dates.month, dates.weekday.clone())?;
        query.dates = Some(DateSelection {
            format: parse_date_format(choice)?,
            field: dates.date_field.clone(),
            criteria,
        });
    }
    Ok(query)
}

fn run_fields(file: &str, date_format: Option<&str>, json: bool) -> Result<()> {
    let mut session = Session::load(file)?;
    let format = date_format.map(parse_date_format).transpose()?;
    let listing = session.listing(format.as_ref());

    if json {
        let text = serde_json::to_string_pretty(&listing).context("Failed to serialize field listing")?;
        println!("{}", text);
        return Ok(());
    }

    println!("Fields:");
    for line in session.catalog().listing() {
        println!("{}", line);
    }

    if let Some(format) = &format {
        println!();
        if listing.date_fields.is_empty() {
            println!("No fields detected as dates with format '{}'.", format);
        } else {
            println!("Fields detected as dates with format '{}':", format);
            for line in fieldplot::catalog::numbered(&listing.date_fields) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn print_regression(result: &QueryResult, query: &Query, json: bool) -> Result<()> {
    let fit = result
        .regression
        .as_ref()
        .context("Regression produced no fit")?;

    if json {
        let text = serde_json::to_string_pretty(fit).context("Failed to serialize regression")?;
        println!("{}", text);
        return Ok(());
    }

    println!("--- Regression Results ---");
    println!("Slope: {:.6}", fit.slope);
    println!("Intercept: {:.6}", fit.intercept);
    println!("R-squared: {:.6}", fit.r_squared);
    println!("Standard error: {:.6}", fit.std_err);
    println!("P-value: {:.6}", fit.p_value);
    println!("Points: {}", fit.n);
    println!();
    println!("Regression equation: {}", fit.equation(&query.x, &query.y));
    Ok(())
}

/// Write the rendered chart to the output file, or to stdout when allowed
fn write_chart(result: &QueryResult, output: &OutputArgs, to_stdout: bool) -> Result<()> {
    if output.output.is_none() && !to_stdout {
        return Ok(());
    }

    let mut options = match &output.options {
        Some(json) => RenderOptions::from_json(json)?,
        None => RenderOptions::default(),
    };
    if let Some(path) = &output.output {
        options = options.for_output(path);
    }

    let bytes = graph::render(&result.chart, &options).context("Failed to render chart")?;

    match &output.output {
        Some(path) => write_file(path, &bytes),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .context("Failed to write chart to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
            Ok(())
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))
}
