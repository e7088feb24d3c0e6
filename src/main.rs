//! CLI entry point for gradebook_rollup.
//!
//! Assembles an assignment's weighted grade report from activity exports
//! already downloaded to disk, and inspects export headers.

mod infra;

use crate::infra::exports::DirectoryExports;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gradebook_rollup::{
    catalog::{AssignmentCatalog, CourseCatalog},
    config::RunConfig,
    email::{apply_email_map, check_email_format, merge_email_columns},
    export::RawTable,
    header::{Category, HeaderSchema},
    output::{print_json, print_pretty, write_report},
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gradebook_rollup")]
#[command(about = "Assemble weighted grade reports from activity exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the final report for one assignment
    Assemble {
        /// JSON run configuration
        #[arg(short, long, default_value = "rollup.json")]
        config: String,

        /// Directory holding one `section=<id>` folder of CSV exports per section
        #[arg(short, long, default_value = "exports")]
        exports_dir: String,

        /// CSV file to write the report to
        #[arg(short, long, default_value = "report.csv")]
        output: String,

        /// Also log the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Parse the header row of one export and log the recognized columns
    Headers {
        /// Path to an exported CSV file
        #[arg(value_name = "FILE")]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gradebook_rollup.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gradebook_rollup.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble {
            config,
            exports_dir,
            output,
            json,
        } => {
            assemble(&config, &exports_dir, &output, json).await?;
        }
        Commands::Headers { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {file}"))?;
            let table = RawTable::from_csv(&text)?;
            let schema = HeaderSchema::parse(table.headers())?;

            info!(
                file,
                rows = table.len(),
                total = schema.total.points,
                "Export header"
            );
            for category in Category::ALL {
                info!(
                    category = %category,
                    declared = schema.category_total(category).points,
                    items = schema.items(category).len(),
                    "Category"
                );
            }
        }
    }

    Ok(())
}

/// Runs the whole pipeline for the assignment named in the config.
#[tracing::instrument(skip(json))]
async fn assemble(config_path: &str, exports_dir: &str, output: &str, json: bool) -> Result<()> {
    let config = RunConfig::load(config_path)?;

    if let Some(course) = &config.course {
        let text = std::fs::read_to_string(&course.catalog)
            .with_context(|| format!("failed to read course list {}", course.catalog.display()))?;
        let courses = CourseCatalog::from_json(&text)?;
        let course = courses.find(&course.search())?;
        info!(course_id = course.id, code = %course.code, title = %course.title, "Course selected");
    }

    let catalog_text = std::fs::read_to_string(&config.catalog)
        .with_context(|| format!("failed to read catalog {}", config.catalog.display()))?;
    let catalog = AssignmentCatalog::from_json(&catalog_text)?;
    let assignment = catalog.find(config.assignment_id, config.assignment_title.as_deref())?;
    info!(
        assignment_id = assignment.id,
        title = %assignment.title,
        sections = assignment.sections.len(),
        "Assignment selected"
    );

    let dues = config.dues()?;
    let preferred = config.preferred_email_regex()?;
    let required = config.required_email_regex()?;

    // All exports are read before any merging starts.
    let exports = DirectoryExports::load(exports_dir, &assignment.sections.ids()).await?;

    let export = assignment.export_report_with_dues(
        &exports,
        &dues,
        config.include_time_spent,
        config.combine.op(),
    )?;
    info!(filename = %export.filename, rows = export.report.len(), "Report assembled");

    let mut table = merge_email_columns(export.report, &preferred)?;
    if !config.email_map.is_empty() {
        table = apply_email_map(table, &config.email_map)?;
    }
    if let Some(required) = &required {
        check_email_format(&table, required)?;
    }

    write_report(output, &table)?;
    print_pretty(&table);
    if json {
        print_json(&table)?;
    }

    info!(output, rows = table.len(), "Report written");
    Ok(())
}
