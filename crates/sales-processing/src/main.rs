//! CLI entry point for store sales preprocessing and analysis.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use sales_processing::analysis::{
    DistributionComparator, HolidaySalesAnalyzer, PromoImpactAnalyzer, StoreWeekSales,
    WeekdayOpeningAnalyzer,
};
use sales_processing::{
    DateFeatureExpander, DateFeatureNames, Pipeline, PipelineConfig, PreprocessingError,
    TargetType, Transformer, TypeCoercer, io, records_to_frame,
};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Store sales preprocessing pipeline",
    long_about = "Fit and apply the store sales preprocessing pipeline, and run the \
                  exploratory analyses.\n\n\
                  EXAMPLES:\n  \
                  # Fit on training data and save the fitted pipeline\n  \
                  sales-processing fit -i train.csv -p pipeline.json --drop Sales,Customers\n\n  \
                  # Apply it to new data\n  \
                  sales-processing transform -p pipeline.json -i test.csv -o features.csv\n\n  \
                  # Compare the promo distribution of two files\n  \
                  sales-processing compare --first train.csv --second test.csv --column Promo\n\n  \
                  # Stores that depend on promotions\n  \
                  sales-processing promo -i train.csv --json\n\n  \
                  # Weekend sales of stores that open every weekday versus the rest\n  \
                  sales-processing weekday-opening -i train.csv"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the JSON result is written.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the pipeline on a CSV file and save it as JSON
    Fit(FitArgs),
    /// Apply a saved pipeline to a CSV file or to JSON sales records
    Transform(TransformArgs),
    /// Compare the leading category share of a column across two CSV files
    Compare(CompareArgs),
    /// Per-store ratio of non-promo to promo sales
    Promo(PromoArgs),
    /// Total sales per public holiday
    HolidaySales(HolidaySalesArgs),
    /// Weekday and weekend sales of stores grouped by weekday opening
    WeekdayOpening(WeekdayOpeningArgs),
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Training CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the fitted pipeline
    #[arg(short, long, default_value = "pipeline.json")]
    pipeline: PathBuf,

    /// Pipeline configuration (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Columns removed before fitting (targets, leakage)
    #[arg(long, value_delimiter = ',')]
    drop: Vec<String>,

    /// Also write the transformed training data as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Fitted pipeline written by `fit`
    #[arg(short, long)]
    pipeline: PathBuf,

    /// CSV file to transform
    #[arg(short, long, conflicts_with = "records", required_unless_present = "records")]
    input: Option<PathBuf>,

    /// JSON array of sales records to transform
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Output CSV file
    #[arg(short, long, default_value = "features.csv")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(long)]
    first: PathBuf,

    #[arg(long)]
    second: PathBuf,

    /// Column to compare
    #[arg(long)]
    column: String,

    /// Maximum difference in percentage points considered similar
    #[arg(long, default_value = "5.0")]
    threshold: f64,
}

#[derive(Args, Debug)]
struct PromoArgs {
    /// CSV file with Store, Promo and Sales columns
    #[arg(short, long)]
    input: PathBuf,

    /// Write the full ratio table as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HolidaySalesArgs {
    /// CSV file with Date, DayOfWeek and Sales columns
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct WeekdayOpeningArgs {
    /// CSV file with Store, Date, Open and Sales columns
    #[arg(short, long)]
    input: PathBuf,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_fit(args: &FitArgs, json: bool) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<PipelineConfig>(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let mut df = io::load_csv(&args.input)?;
    for column in &args.drop {
        df = df
            .drop(column)
            .map_err(|_| PreprocessingError::ColumnNotFound(column.clone()))?;
        debug!("Dropped '{}' before fitting", column);
    }

    let mut pipeline = Pipeline::from_config(&config)?;
    let transformed = pipeline.fit_transform(&df)?;
    pipeline.save_json(&args.pipeline)?;

    if let Some(output) = &args.output {
        io::write_csv(&transformed, output)?;
    }

    if json {
        print_json(&serde_json::json!({
            "pipeline": args.pipeline,
            "rows": transformed.height(),
            "output_columns": pipeline.output_columns(),
        }))
    } else {
        println!("Pipeline fitted on {} rows", df.height());
        println!("Saved to: {}", args.pipeline.display());
        println!("Output columns: {}", pipeline.output_columns().unwrap_or_default().join(", "));
        Ok(())
    }
}

fn run_transform(args: &TransformArgs, json: bool) -> Result<()> {
    let pipeline = Pipeline::load_json(&args.pipeline)?;

    let df = match (&args.input, &args.records) {
        (Some(input), _) => io::load_csv(input)?,
        (None, Some(records)) => records_to_frame(&io::load_records(records)?)?,
        (None, None) => return Err(anyhow!("Either --input or --records is required")),
    };

    let transformed = pipeline.transform(&df)?;
    io::write_csv(&transformed, &args.output)?;

    if json {
        print_json(&serde_json::json!({
            "output": args.output,
            "rows": transformed.height(),
            "columns": transformed.width(),
        }))
    } else {
        println!(
            "Transformed {} rows into {} columns",
            transformed.height(),
            transformed.width()
        );
        println!("Written to: {}", args.output.display());
        Ok(())
    }
}

fn run_compare(args: &CompareArgs, json: bool) -> Result<()> {
    let first = io::load_csv(&args.first)?;
    let second = io::load_csv(&args.second)?;
    let result = DistributionComparator::compare(&first, &second, &args.column, args.threshold)?;

    if json {
        return print_json(&result);
    }

    println!("Column: {}", result.column);
    println!(
        "  {}: {:.2}% of rows are '{}'",
        args.first.display(),
        result.first.share,
        result.first.category
    );
    println!(
        "  {}: {:.2}% of rows are '{}'",
        args.second.display(),
        result.second.share,
        result.second.category
    );
    println!(
        "Difference: {:.2} points -> {} (threshold {})",
        result.difference, result.similarity, result.threshold
    );
    Ok(())
}

fn run_promo(args: &PromoArgs, json: bool) -> Result<()> {
    let df = io::load_csv(&args.input)?;
    let report = PromoImpactAnalyzer::default().analyze(&df)?;

    if let Some(output) = &args.output {
        io::write_csv(&report.to_frame()?, output)?;
    }

    if json {
        return print_json(&serde_json::json!({
            "stores": report.stores,
            "need_promo": report.need_promo(),
            "better_without_promo": report.better_without_promo(),
        }));
    }

    let need_promo = report.need_promo();
    println!("Stores analysed: {}", report.stores.len());
    println!("Stores that need promo ({}):", need_promo.len());
    for store in need_promo {
        println!("  Store {:>5}  ratio {:>8.2}", store.store, store.ratio);
    }
    println!("Stores doing better without promo:");
    for store in report.better_without_promo() {
        println!("  Store {:>5}  ratio {:>8.2}", store.store, store.ratio);
    }
    Ok(())
}

fn run_holiday_sales(args: &HolidaySalesArgs, json: bool) -> Result<()> {
    let mut df = io::load_csv(&args.input)?;

    if df.column(DateFeatureNames::HOLIDAY_NAME).is_err() {
        info!("No holiday column in input; deriving it from the date");
        let config = PipelineConfig::default();
        df = TypeCoercer::new(Some(config.date_column.clone()), vec![], TargetType::Category)
            .transform(&df)?;
        df = DateFeatureExpander::new(config.date_column, config.day_of_week_column)
            .transform(&df)?;
    }

    let rows = HolidaySalesAnalyzer::default().analyze(&df)?;

    if json {
        return print_json(&rows);
    }

    println!("Sales volume by holiday:");
    for row in &rows {
        println!("  {:<28} {:>16.2}", row.holiday, row.total_sales);
    }
    Ok(())
}

fn print_week_sales(title: &str, rows: &[StoreWeekSales]) {
    println!("{} ({}):", title, rows.len());
    for row in rows {
        println!(
            "  Store {:>5}  weekday {:>14.2}  weekend {:>14.2}",
            row.store, row.weekday_sales, row.weekend_sales
        );
    }
}

fn run_weekday_opening(args: &WeekdayOpeningArgs, json: bool) -> Result<()> {
    let df = io::load_csv(&args.input)?;
    let report = WeekdayOpeningAnalyzer::default().analyze(&df)?;

    if json {
        return print_json(&report);
    }

    println!("Weekdays in data: {}", report.weekday_dates);
    print_week_sales("Open on all weekdays", report.group(true));
    print_week_sales("Closed on some weekdays", report.group(false));
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Fit(args) => run_fit(args, cli.json),
        Command::Transform(args) => run_transform(args, cli.json),
        Command::Compare(args) => run_compare(args, cli.json),
        Command::Promo(args) => run_promo(args, cli.json),
        Command::HolidaySales(args) => run_holiday_sales(args, cli.json),
        Command::WeekdayOpening(args) => run_weekday_opening(args, cli.json),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (disabled if --json is set)
    init_logging(&cli.log_level, cli.quiet, cli.json);

    match run(&cli) {
        Err(e) if cli.json => {
            // errors are reported as {code, message} on stdout
            match e.downcast_ref::<PreprocessingError>() {
                Some(err) => print_json(err)?,
                None => print_json(&serde_json::json!({
                    "code": "ERROR",
                    "message": format!("{:#}", e),
                }))?,
            }
            std::process::exit(1);
        }
        other => other,
    }
}
