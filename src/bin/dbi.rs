//! DBI CLI - Command-line interface for Digital Balance scoring
//!
//! Commands:
//! - run: Score a CSV and write every output file
//! - validate: Print schema and identity reports for a CSV
//! - config: Print the effective scoring configuration
//! - doctor: Diagnose input and configuration health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use digital_balance::export::{export_all, ExportedFiles};
use digital_balance::types::{DbiTier, MetricCards, ValidationReport};
use digital_balance::validate::Validator;
use digital_balance::{
    ChartData, Dataset, DbiError, DbiProcessor, RecordFilter, ScoringConfig, DBI_VERSION,
    PRODUCER_NAME,
};

/// dbi - Composition-based balance scoring for daily screen time
#[derive(Parser)]
#[command(name = "dbi")]
#[command(version = DBI_VERSION)]
#[command(about = "Score daily screen-time records with the Digital Balance Index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV and write scored rows, summaries, metric cards and chart data
    Run {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "outputs")]
        out: PathBuf,

        /// Scoring configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Summary format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Only chart rows in these age groups
        #[arg(long = "age-group")]
        age_groups: Vec<String>,

        /// Only chart rows on these devices
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Only chart rows with these internet types
        #[arg(long = "internet-type")]
        internet_types: Vec<String>,

        /// Only chart rows in these DBI tiers
        #[arg(long = "tier", value_enum)]
        tiers: Vec<TierArg>,
    },

    /// Print schema and identity reports for a CSV
    Validate {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Scoring configuration (JSON), used for the identity tolerance
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective scoring configuration as JSON
    Config {
        /// Scoring configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Diagnose input and configuration health
    Doctor {
        /// Input CSV to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Scoring configuration (JSON) to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Metric cards and written paths as JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Balanced,
    Mixed,
    Skewed,
    Unknown,
}

impl From<TierArg> for DbiTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Balanced => DbiTier::Balanced,
            TierArg::Mixed => DbiTier::Mixed,
            TierArg::Skewed => DbiTier::Skewed,
            TierArg::Unknown => DbiTier::Unknown,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();
}

fn run(cli: Cli) -> Result<(), DbiCliError> {
    match cli.command {
        Commands::Run {
            input,
            out,
            config,
            format,
            age_groups,
            devices,
            internet_types,
            tiers,
        } => {
            let filter = RecordFilter {
                age_groups: non_empty(age_groups),
                devices: non_empty(devices),
                internet_types: non_empty(internet_types),
                tiers: non_empty(tiers.into_iter().map(DbiTier::from).collect()),
            };
            cmd_run(&input, &out, config.as_deref(), format, &filter)
        }

        Commands::Validate {
            input,
            config,
            json,
        } => cmd_validate(&input, config.as_deref(), json),

        Commands::Config { config } => cmd_config(config.as_deref()),

        Commands::Doctor {
            input,
            config,
            json,
        } => cmd_doctor(input.as_deref(), config.as_deref(), json),
    }
}

fn cmd_run(
    input: &Path,
    out: &Path,
    config: Option<&Path>,
    format: OutputFormat,
    filter: &RecordFilter,
) -> Result<(), DbiCliError> {
    let processor = DbiProcessor::with_config(load_config(config)?)?;
    let output = processor.process_path(input)?;

    let charted = filter.apply(&output.scored.rows);
    if charted.len() != output.scored.rows.len() {
        info!(
            kept = charted.len(),
            total = output.scored.rows.len(),
            "Chart filter applied"
        );
    }
    let charts = ChartData::from_scored(charted);
    let files = export_all(out, &output, &charts)?;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "metric_cards": output.cards,
                "files": files,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => print_run_summary(&output.cards, &files),
    }

    Ok(())
}

fn cmd_validate(input: &Path, config: Option<&Path>, json: bool) -> Result<(), DbiCliError> {
    let config = load_config(config)?;
    let dataset = Dataset::from_path(input)?;
    let report = Validator::validate(&dataset, config.identity_tolerance);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_validation(&report);
    }

    let missing = &report.schema.missing_required_cols;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbiCliError::Dbi(DbiError::MissingColumns(missing.clone())))
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), DbiCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(input: Option<&Path>, config: Option<&Path>, json: bool) -> Result<(), DbiCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::new(
        "dbi_version",
        CheckStatus::Ok,
        format!("dbi version {}", DBI_VERSION),
    ));

    // Configuration
    let tolerance = match config {
        None => {
            checks.push(DoctorCheck::new(
                "config",
                CheckStatus::Ok,
                "Using default configuration".to_string(),
            ));
            ScoringConfig::default().identity_tolerance
        }
        Some(path) => match load_config(Some(path)) {
            Ok(cfg) => {
                checks.push(DoctorCheck::new(
                    "config",
                    CheckStatus::Ok,
                    format!(
                        "Configuration valid (balanced >= {}, mixed >= {})",
                        cfg.dbi_balanced_ge, cfg.dbi_mixed_ge
                    ),
                ));
                cfg.identity_tolerance
            }
            Err(e) => {
                checks.push(DoctorCheck::new(
                    "config",
                    CheckStatus::Error,
                    CliError::from(e).message,
                ));
                ScoringConfig::default().identity_tolerance
            }
        },
    };

    // Input dataset
    if let Some(path) = input {
        if !path.exists() {
            checks.push(DoctorCheck::new(
                "input",
                CheckStatus::Error,
                format!("Input file does not exist: {}", path.display()),
            ));
        } else {
            match Dataset::from_path(path) {
                Ok(dataset) => checks.extend(dataset_checks(&dataset, tolerance)),
                Err(e) => checks.push(DoctorCheck::new(
                    "input",
                    CheckStatus::Error,
                    format!("Cannot read input: {}", e),
                )),
            }
        }
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DBI_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("DBI Doctor Report");
        println!("=================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DbiCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn dataset_checks(dataset: &Dataset, tolerance: f64) -> Vec<DoctorCheck> {
    let report = Validator::validate(dataset, tolerance);
    let schema = &report.schema;
    let mut checks = vec![DoctorCheck::new(
        "input",
        CheckStatus::Ok,
        format!("{} rows, {} columns", schema.n_rows, schema.n_cols),
    )];

    checks.push(if schema.missing_required_cols.is_empty() {
        DoctorCheck::new(
            "required_columns",
            CheckStatus::Ok,
            "All required columns present".to_string(),
        )
    } else {
        DoctorCheck::new(
            "required_columns",
            CheckStatus::Error,
            format!("Missing: {}", schema.missing_required_cols.join(", ")),
        )
    });

    if schema.n_rows == 0 {
        checks.push(DoctorCheck::new(
            "rows",
            CheckStatus::Warning,
            "Input has a header but no rows".to_string(),
        ));
    }

    if schema.has_missing_values {
        checks.push(DoctorCheck::new(
            "missing_values",
            CheckStatus::Warning,
            format!(
                "Some cells are missing ({} unparseable); affected fields score as absent",
                schema.unparseable_cells
            ),
        ));
    }

    if let Some(dupes) = schema.duplicate_user_id.filter(|&d| d > 0) {
        checks.push(DoctorCheck::new(
            "duplicate_user_id",
            CheckStatus::Warning,
            format!("{} rows repeat an earlier user_id", dupes),
        ));
    }

    if let Some(failing) = report.identity.rows_failing.filter(|&f| f > 0) {
        checks.push(DoctorCheck::new(
            "identity",
            CheckStatus::Warning,
            format!(
                "{} rows where categories do not sum to total (max diff {})",
                failing,
                fmt_opt(report.identity.max_abs_diff, 6)
            ),
        ));
    }

    debug!(checks = checks.len(), "Dataset checks complete");
    checks
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<ScoringConfig, DbiCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(ScoringConfig::from_json(&json)?)
        }
        None => Ok(ScoringConfig::default()),
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn fmt_opt(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", digits, v),
        None => "n/a".to_string(),
    }
}

fn print_run_summary(cards: &MetricCards, files: &ExportedFiles) {
    let dbi = &cards.thresholds.dbi_thresholds;
    let load = &cards.thresholds.load_quantiles;

    println!("DBI Run Summary");
    println!("===============");
    println!("Rows:                  {}", cards.n_rows);
    println!("Days:                  {}", cards.n_days);
    println!("Avg screen time (h):   {}", fmt_opt(cards.avg_total_screen_time, 2));
    println!("Avg DBI:               {}", fmt_opt(cards.avg_dbi, 3));
    println!("Balanced:              {:.1}%", cards.balanced_rate_pct);
    println!("Skewed:                {:.1}%", cards.skewed_rate_pct);
    println!("High load + skewed:    {:.1}%", cards.highload_skewed_rate_pct);
    println!("\nThresholds:");
    println!("  DBI balanced >= {}, mixed >= {}", dbi.balanced_ge, dbi.mixed_ge);
    println!(
        "  Load q33 = {}, q66 = {}",
        fmt_opt(load.q33, 2),
        fmt_opt(load.q66, 2)
    );
    println!("\nFiles:");
    for path in [
        &files.scored_rows,
        &files.segment_summary,
        &files.daily_summary,
        &files.metric_cards,
        &files.chart_data,
    ] {
        println!("  {}", path.display());
    }
}

fn print_validation(report: &ValidationReport) {
    let schema = &report.schema;
    let identity = &report.identity;

    println!("Validation Report");
    println!("=================");
    println!("Rows:              {}", schema.n_rows);
    println!("Columns:           {}", schema.n_cols);
    if schema.missing_required_cols.is_empty() {
        println!("Missing columns:   none");
    } else {
        println!(
            "Missing columns:   {}",
            schema.missing_required_cols.join(", ")
        );
    }
    println!("Missing values:    {}", schema.has_missing_values);
    println!("Unparseable cells: {}", schema.unparseable_cells);
    match schema.duplicate_user_id {
        Some(n) => println!("Duplicate user_id: {}", n),
        None => println!("Duplicate user_id: not checked"),
    }

    println!("\nIdentity check (social + work + entertainment = total):");
    if identity.identity_check_run {
        println!("  Max abs diff:    {}", fmt_opt(identity.max_abs_diff, 9));
        println!(
            "  Rows failing:    {}",
            identity.rows_failing.unwrap_or_default()
        );
    } else {
        println!("  Not run (hour columns missing)");
    }
}

// Error types

#[derive(Debug)]
enum DbiCliError {
    Io(io::Error),
    Dbi(DbiError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for DbiCliError {
    fn from(e: io::Error) -> Self {
        DbiCliError::Io(e)
    }
}

impl From<DbiError> for DbiCliError {
    fn from(e: DbiError) -> Self {
        DbiCliError::Dbi(e)
    }
}

impl From<serde_json::Error> for DbiCliError {
    fn from(e: serde_json::Error) -> Self {
        DbiCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<DbiCliError> for CliError {
    fn from(e: DbiCliError) -> Self {
        match e {
            DbiCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            DbiCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax"),
            DbiCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            DbiCliError::Dbi(e) => {
                let message = e.to_string();
                match e {
                    DbiError::Csv(_) => {
                        CliError::new("CSV_ERROR", message, "Check that the input is valid CSV")
                    }
                    DbiError::Io(_) => {
                        CliError::new("IO_ERROR", message, "Check file paths and permissions")
                    }
                    DbiError::Json(_) => {
                        CliError::new("JSON_ERROR", message, "Check the configuration file syntax")
                    }
                    DbiError::MissingColumns(_) => CliError::new(
                        "MISSING_COLUMNS",
                        message,
                        "Run 'dbi validate' to see the schema report",
                    ),
                    DbiError::InvalidConfig(_) => CliError::new(
                        "INVALID_CONFIG",
                        message,
                        "Run 'dbi config' to print the defaults",
                    ),
                    DbiError::EmptyInput => {
                        CliError::new("EMPTY_INPUT", message, "Ensure the input has a header row")
                    }
                }
            }
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: String) -> Self {
        DoctorCheck {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
