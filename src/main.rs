//! CLI entry point for the sales method rater.
//!
//! Each analysis stage is a subcommand that loads and cleans the input CSV,
//! runs the stage, and writes its table. `report` runs every stage and writes
//! all tables into a dated run directory.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sales_method_rater::analyzers::aggregate::{GroupKey, summarize_groups};
use sales_method_rater::analyzers::analyzer::analyze;
use sales_method_rater::analyzers::distribution::summarize_distribution;
use sales_method_rater::analyzers::efficiency::analyze_efficiency;
use sales_method_rater::analyzers::temporal::compare_weeks;
use sales_method_rater::{
    cleaner::{CleanedDataset, load_and_clean},
    config::RaterConfig,
    error::RaterError,
    output::{emit_table, print_json, print_pretty, write_table},
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "sales_method_rater")]
#[command(about = "Compare sales methods from experiment transactions", long_about = None)]
struct Cli {
    /// JSON config file (falls back to $SALES_RATER_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupBy {
    Method,
    Week,
    MethodWeek,
}

impl From<GroupBy> for GroupKey {
    fn from(g: GroupBy) -> Self {
        match g {
            GroupBy::Method => GroupKey::Method,
            GroupBy::Week => GroupKey::Week,
            GroupBy::MethodWeek => GroupKey::MethodWeek,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and normalize the input, writing the cleaned rows
    Clean {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        /// CSV file for the cleaned rows (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file for rejected rows
        #[arg(short, long)]
        rejections: Option<String>,
    },
    /// Count customers and sum revenue per group
    Group {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        /// Grouping key
        #[arg(short, long, value_enum, default_value_t = GroupBy::Method)]
        by: GroupBy,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Revenue quartiles per method
    Distribution {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Week-over-week revenue changes and crossovers
    Temporal {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        #[arg(short, long)]
        output: Option<String>,

        /// Also write the weekly revenue table here
        #[arg(long)]
        weekly: Option<String>,
    },
    /// Revenue per minute per method and under the target mix
    Efficiency {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Run every stage and write all tables
    Report {
        #[arg(value_name = "INPUT_CSV")]
        input: String,

        /// Base directory; tables land in <OUTPUT_DIR>/run_date=YYYY-MM-DD
        #[arg(short = 'd', long, default_value = "reports")]
        output_dir: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/sales_method_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("sales_method_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = RaterConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Clean {
            input,
            output,
            rejections,
        } => {
            let cleaned = load(&input, &config)?;
            emit_table(output.as_deref(), &cleaned.transactions)?;
            if let Some(path) = rejections {
                write_table(Path::new(&path), &cleaned.rejections)?;
            }
        }
        Commands::Group { input, by, output } => {
            let cleaned = load(&input, &config)?;
            let groups = summarize_groups(&cleaned.transactions, by.into());
            emit_table(output.as_deref(), &groups)?;
        }
        Commands::Distribution { input, output } => {
            let cleaned = load(&input, &config)?;
            let report =
                summarize_distribution(&cleaned.transactions).ok_or(RaterError::EmptyDataset)?;
            info!(
                best = %report.best_method,
                worst = %report.worst_method,
                gap = %report.performance_gap_pct,
                "Revenue distribution"
            );
            emit_table(output.as_deref(), &report.rows)?;
        }
        Commands::Temporal {
            input,
            output,
            weekly,
        } => {
            let cleaned = load(&input, &config)?;
            let report = compare_weeks(&cleaned.transactions, config.weeks());
            for c in report.crossovers.iter().filter(|c| c.crossover_week.is_some()) {
                info!(
                    leader = %c.leader,
                    challenger = %c.challenger,
                    week = c.crossover_week,
                    "Crossover"
                );
            }
            if let Some(path) = weekly {
                write_table(Path::new(&path), &report.weekly)?;
            }
            emit_table(output.as_deref(), &report.trends)?;
        }
        Commands::Efficiency { input, output } => {
            let cleaned = load(&input, &config)?;
            config.require_time_costs(cleaned.methods())?;
            let report = analyze_efficiency(
                &cleaned.transactions,
                &config.time_cost,
                &config.allocation_mix,
            )?;
            print_json(&report)?;
            emit_table(output.as_deref(), &report.methods)?;
        }
        Commands::Report { input, output_dir } => {
            let report = analyze(&input, &config)?;
            let dir = report.write_run(&output_dir, &input)?;
            println!("{}", dir.display());
        }
    }

    Ok(())
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Loads and cleans `input`, logging the row accounting.
fn load(input: &str, config: &RaterConfig) -> Result<CleanedDataset> {
    let cleaned = load_and_clean(input, config)?;
    print_pretty(&cleaned.stats);
    if cleaned.stats.rows_rejected > 0 {
        warn!(
            rejected = cleaned.stats.rows_rejected,
            pct = cleaned.stats.reject_pct(),
            "Rows rejected during cleaning"
        );
    }
    Ok(cleaned)
}
