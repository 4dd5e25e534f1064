//! # gak-cli: The Console of gak
//!
//! Shell front end for the query builder and executor.
//!
//! - `gak build --index web --spec '{"status": "active"}'`: compile a filter spec.
//! - `gak search 'search index=web | head 10'`: run a tracked job.
//! - `gak oneshot 'search index=web | head 10'`: run a capped one-shot search.
//! - `gak unique --index web --field host`: list distinct values.
//! - `gak fields --index web`: list field names.
//! - `gak indexes`: list indexes.
//!
//! Connection settings come from `SPLUNK_*` variables (a `.env` file is
//! honoured), executor tuning from `gak.toml`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gak_query::{QueryBuilder, QuerySpec};
use gak_splunk::{
    CancelToken, ColumnType, ExecutorConfig, JobOptions, OneshotRequest, QueryExecutor,
    ResultTable, SplunkClient, SplunkConfig, TimeBound,
};

/// gak: structured Splunk searches from the shell.
#[derive(Parser)]
#[command(name = "gak", version, about, long_about = None)]
struct Cli {
    /// Executor tuning file (`[executor]` table). Missing file means defaults.
    #[arg(long, global = true, env = "GAK_CONFIG", default_value = "gak.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter spec into a search string (no network).
    Build {
        #[arg(long)]
        index: String,

        /// JSON object of field conditions.
        #[arg(long)]
        spec: Option<String>,

        /// Projected columns, comma separated.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Sort columns, comma separated. Omitted means random order.
        #[arg(long, value_delimiter = ',')]
        sort: Vec<String>,
    },

    /// Run a tracked search job.
    Search {
        query: String,

        /// Relative time modifier (`-24h@h`) or RFC 3339 timestamp.
        #[arg(long)]
        earliest: Option<String>,

        #[arg(long)]
        latest: Option<String>,

        /// Cast a column, e.g. `--cast amount=float`. Repeatable.
        #[arg(long, value_parser = parse_cast)]
        cast: Vec<(String, ColumnType)>,

        /// Print rows as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Run a one-shot search with a row cap.
    Oneshot {
        query: String,

        /// Row cap (default from config).
        #[arg(long)]
        count: Option<usize>,

        /// Keep Splunk's internal `_*` fields.
        #[arg(long)]
        keep_system: bool,

        #[arg(long, value_parser = parse_cast)]
        cast: Vec<(String, ColumnType)>,

        #[arg(long)]
        json: bool,
    },

    /// List the distinct values of a field.
    Unique {
        #[arg(long)]
        index: String,
        #[arg(long)]
        field: String,
    },

    /// List the fields present in an index.
    Fields {
        #[arg(long)]
        index: String,
    },

    /// List the indexes visible to the configured user.
    Indexes,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "gak=info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            index,
            spec,
            fields,
            sort,
        } => build(&index, spec.as_deref(), &fields, &sort),
        command => {
            let executor_config = ExecutorConfig::load(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;
            let splunk_config = SplunkConfig::from_env()?;
            let client = SplunkClient::connect(&splunk_config)?;
            let mut exec = QueryExecutor::new(client, executor_config);

            let result = run(&mut exec, command);
            exec.close();
            result
        }
    }
}

fn run(exec: &mut QueryExecutor<SplunkClient>, command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            index,
            spec,
            fields,
            sort,
        } => build(&index, spec.as_deref(), &fields, &sort),

        Commands::Search {
            query,
            earliest,
            latest,
            cast,
            json,
        } => {
            let opts = JobOptions {
                earliest_time: earliest.as_deref().map(TimeBound::parse),
                latest_time: latest.as_deref().map(TimeBound::parse),
                ..exec.job_options()
            };
            match exec.to_table(&query, &opts, &CancelToken::new()) {
                Ok(table) => print_table(&apply_casts(table, cast)?, json),
                Err(failure) if !failure.partial.is_empty() => {
                    eprintln!("Partial results ({} rows) before failure:", failure.partial.len());
                    print_table(&ResultTable::from_rows(failure.partial.clone()), json)?;
                    Err(failure.into())
                }
                Err(failure) => Err(failure.into()),
            }
        }

        Commands::Oneshot {
            query,
            count,
            keep_system,
            cast,
            json,
        } => {
            let mut request = if keep_system {
                OneshotRequest::keep_all()
            } else {
                OneshotRequest::default()
            };
            request.count = count;
            let table = exec.oneshot(&query, &request)?;
            print_table(&apply_casts(table, cast)?, json)
        }

        Commands::Unique { index, field } => {
            for value in exec.unique_values(&index, &field)? {
                println!("{}", value);
            }
            Ok(())
        }

        Commands::Fields { index } => {
            for field in exec.field_names(&index, &CancelToken::new())? {
                println!("{}", field);
            }
            Ok(())
        }

        Commands::Indexes => {
            for index in exec.indexes()? {
                println!("{}", index);
            }
            Ok(())
        }
    }
}

fn build(index: &str, spec: Option<&str>, fields: &[String], sort: &[String]) -> Result<()> {
    let spec: QuerySpec = match spec {
        Some(raw) => serde_json::from_str(raw).context("parsing --spec")?,
        None => QuerySpec::new(),
    };

    let built = QueryBuilder::new(index)
        .spec(spec)
        .fields(fields.iter().cloned())
        .sort(sort.iter().cloned())
        .build()?;

    for diagnostic in &built.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    println!("{}", built.query);
    Ok(())
}

fn parse_cast(raw: &str) -> Result<(String, ColumnType), String> {
    let (column, ty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=TYPE, got '{}'", raw))?;
    if column.trim().is_empty() {
        return Err(format!("missing column name in '{}'", raw));
    }
    Ok((column.trim().to_string(), ty.parse()?))
}

fn apply_casts(table: ResultTable, casts: Vec<(String, ColumnType)>) -> Result<ResultTable> {
    if casts.is_empty() {
        return Ok(table);
    }
    let schema: IndexMap<String, ColumnType> = casts.into_iter().collect();
    Ok(table.cast_columns(&schema)?)
}

fn print_table(table: &ResultTable, json: bool) -> Result<()> {
    if json {
        for row in table.rows() {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    let columns = table.display_columns();
    if table.is_empty() || columns.is_empty() {
        eprintln!("(no rows)");
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().copied());
    for row in table.rows() {
        builder.push_record(columns.iter().map(|c| ResultTable::cell(row, c)));
    }
    let mut rendered = builder.build();
    rendered.with(Style::psql());

    println!("{}", rendered);
    eprintln!("{} rows", table.len());
    tracing::debug!(
        "{} internal columns hidden",
        table.columns().len() - columns.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cast() {
        assert_eq!(
            parse_cast("amount=float").unwrap(),
            ("amount".to_string(), ColumnType::Float)
        );
        assert!(parse_cast("amount").is_err());
        assert!(parse_cast("=int").is_err());
        assert!(parse_cast("amount=blob").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "gak", "build", "--index", "web", "--fields", "a,b", "--sort", "a",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { fields, sort, .. } => {
                assert_eq!(fields, vec!["a", "b"]);
                assert_eq!(sort, vec!["a"]);
            }
            _ => panic!("expected build"),
        }

        let cli = Cli::try_parse_from([
            "gak", "oneshot", "search index=web", "--count", "5", "--keep-system",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Oneshot { count: Some(5), keep_system: true, .. }
        ));
    }

    #[test]
    fn test_build_rejects_bad_index() {
        assert!(build("bad index", None, &[], &[]).is_err());
        assert!(build("web", Some(r#"{"status": "active"}"#), &[], &[]).is_ok());
    }
}
