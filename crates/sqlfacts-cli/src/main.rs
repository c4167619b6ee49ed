use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use sqlfacts_core::{Config, Report, SchemaModel, Severity};
use sqlfacts_sql::{Analyzer, ParserCapabilities};

/// sqlfacts - structural fact extraction and schema validation for SQL
#[derive(Parser)]
#[command(name = "sqlfacts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: sqlfacts.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract Query Facts from SQL files, directories or inline SQL
    Analyze {
        /// SQL files or directories (searched recursively for *.sql)
        paths: Vec<PathBuf>,

        /// Inline SQL to analyze
        #[arg(long)]
        sql: Option<String>,

        /// DDL file to validate columns against
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Write report.json here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a human-readable summary instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Print the Schema Model built from a DDL file
    Schema {
        /// DDL file with CREATE TABLE statements
        ddl: PathBuf,
    },

    /// Print the SQL grammar subset the parser supports
    Capabilities,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("sqlfacts.toml").exists() {
        Config::from_file(Path::new("sqlfacts.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    match cli.command {
        Commands::Analyze {
            paths,
            sql,
            schema,
            output,
            summary,
        } => analyze_command(
            &config,
            &paths,
            sql.as_deref(),
            schema.as_deref(),
            output.as_deref(),
            summary,
            cli.verbose,
        ),
        Commands::Schema { ddl } => schema_command(&config, &ddl),
        Commands::Capabilities => {
            print!("{}", ParserCapabilities::CURRENT);
            Ok(())
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Analyze command - extract facts, optionally validate against a schema
fn analyze_command(
    config: &Config,
    paths: &[PathBuf],
    inline_sql: Option<&str>,
    schema_path: Option<&Path>,
    output: Option<&Path>,
    summary: bool,
    verbose: bool,
) -> Result<()> {
    let analyzer = Analyzer::from_config(config);

    let files = collect_sql_files(paths)?;
    tracing::debug!(files = files.len(), inline = inline_sql.is_some(), "collected SQL sources");
    if files.is_empty() && inline_sql.is_none() {
        return Err(anyhow::anyhow!(
            "Nothing to analyze: pass SQL files, directories or --sql"
        ));
    }

    let schema = match schema_path {
        Some(path) => Some(load_schema(&analyzer, path)?),
        None => None,
    };

    let mut report = Report::new();
    if let Some(schema) = &schema {
        if verbose {
            eprintln!("{} {} tables", "Loaded schema:".cyan(), schema.table_count());
        }
        report = report.with_schema(schema.clone());
    }

    if let Some(sql) = inline_sql {
        analyzer.analyze_into(&mut report, sql, schema.as_ref(), None);
    }

    for file in &files {
        if verbose {
            eprintln!("  {} {}...", "Analyzing".cyan(), file.display());
        }
        let sql = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read SQL file {}", file.display()))?;
        let source = file.display().to_string();
        analyzer.analyze_into(&mut report, &sql, schema.as_ref(), Some(&source));
    }

    if let Some(output) = output {
        report.save_to_file(output)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), output.display());
        }
    }

    if summary {
        print_report_summary(&report);
    } else if output.is_none() {
        println!("{}", report.to_json()?);
    }

    // Exit with error code if there are errors
    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Schema command - dump the Schema Model as JSON
fn schema_command(config: &Config, ddl_path: &Path) -> Result<()> {
    let analyzer = Analyzer::from_config(config);
    let schema = load_schema(&analyzer, ddl_path)?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn load_schema(analyzer: &Analyzer, path: &Path) -> Result<SchemaModel> {
    let ddl = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read DDL file {}", path.display()))?;

    analyzer.parse_schema(&ddl).map_err(|e| {
        let location = e.to_diagnostic(Some(&path.display().to_string())).location;
        match location {
            Some(location) => anyhow::anyhow!("Failed to parse schema at {}: {}", location, e),
            None => anyhow::anyhow!("Failed to parse schema: {}", e),
        }
    })
}

/// Expand directories into their `*.sql` files, sorted per directory
fn collect_sql_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|file| {
                    file.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(anyhow::anyhow!("Path not found: {}", path.display()));
        }
    }

    Ok(files)
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "SQL Fact Extraction Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Statements:".bold());
    for (i, fact) in report.statements.iter().enumerate() {
        let tables = fact.table_names().join(", ");
        println!(
            "  {}. {} [{}] columns: {}, joins: {}, conditions: {}",
            i + 1,
            fact.query_type.to_string().green(),
            tables,
            fact.columns.len(),
            fact.joins.len(),
            fact.where_conditions.len()
        );

        for join in &fact.joins {
            println!(
                "       {} {}.{} = {}.{}",
                join.join_type.to_string().cyan(),
                join.left_table,
                join.left_column,
                join.right_table,
                join.right_column
            );
        }

        let invalid: Vec<String> = fact
            .columns
            .iter()
            .filter(|column| column.is_valid == Some(false))
            .map(|column| match &column.table {
                Some(table) => format!("{}.{}", table, column.name),
                None => column.name.clone(),
            })
            .collect();
        if !invalid.is_empty() {
            println!("       {} {}", "unknown columns:".red(), invalid.join(", "));
        }
    }
    println!();

    println!("{}", "Summary:".bold());
    println!("  Statements: {}", report.summary.statements);
    if report.schema.is_some() {
        println!("  Schema tables: {}", report.summary.schema_tables);
    }
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

            if let Some(loc) = &diag.location {
                println!("    at {}", loc);
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
