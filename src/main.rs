//! fluxkit CLI
//!
//! Command-line interface for building and running Flux queries and writing
//! points:
//! - Query a bucket with filters, pivot, windowing and limits
//! - Write a single point
//! - Generate a config file

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fluxkit::flux::{row, AggregateFn, Literal, Pipeline, Predicate, Query};
use fluxkit::measurement::{FieldValue, Measurement};
use fluxkit::{Client, Config, LoggingConfig, Precision, Record};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "fluxkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and run Flux queries, write line protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ./fluxkit.toml, user config dir, /etc/fluxkit)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server URL, overrides the config file
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Organization, overrides the config file
    #[arg(long, global = true)]
    pub org: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query a bucket
    Query {
        /// Bucket to read from
        bucket: String,
        /// Range start: relative duration, RFC3339 time or unix seconds
        #[arg(short, long, default_value = "-1h")]
        start: String,
        /// Range stop
        #[arg(long)]
        stop: Option<String>,
        /// Equality filters in column=value format, joined with `and`
        #[arg(long)]
        filter: Vec<String>,
        /// Aggregate into windows of this duration (e.g., 5m)
        #[arg(short, long)]
        window: Option<String>,
        /// Aggregate function (mean, median, sum, min, max, count, first, last)
        #[arg(short, long, default_value = "mean")]
        aggregate: String,
        /// Pivot fields into columns
        #[arg(long)]
        pivot: bool,
        /// Maximum rows per table
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print the Flux text instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Write one point
    Write {
        /// Bucket to write into
        bucket: String,
        /// Measurement name
        measurement: String,
        /// Fields in key=value format (1.5, 3i, 4u, true, "text")
        #[arg(required = true)]
        fields: Vec<String>,
        /// Tags in key=value format
        #[arg(short = 'T', long)]
        tags: Vec<String>,
        /// Timestamp: RFC3339 or unix time in s, ms, us or ns (default: server time)
        #[arg(short, long)]
        time: Option<String>,
        /// Print the line protocol instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.url.as_deref(), cli.org.as_deref())?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Query {
            bucket,
            start,
            stop,
            filter,
            window,
            aggregate,
            pivot,
            limit,
            dry_run,
        } => {
            let query = build_query(
                &bucket,
                &start,
                stop.as_deref(),
                &filter,
                window.as_deref(),
                &aggregate,
                pivot,
                limit,
            )?;

            if dry_run {
                println!("{}", query);
                return Ok(());
            }

            let client = Client::from_config(&config)?;
            let tables = client.execute(&query).await?;
            client.close();

            let records = fluxkit::result::shape_records(tables);
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&records)?),
                _ => print_table(&records),
            }
        }

        Commands::Write {
            bucket,
            measurement,
            fields,
            tags,
            time,
            dry_run,
        } => {
            let point = build_point(
                &measurement,
                &fields,
                &tags,
                time.as_deref(),
                config.write.precision,
            )?;

            if dry_run {
                println!("{}", point);
                return Ok(());
            }

            let client = Client::from_config(&config)?;
            client.write(&bucket, std::slice::from_ref(&point)).await?;
            client.close();

            println!("Wrote {} to {}", point.name(), bucket);
        }

        Commands::Config { output } => {
            let content = fluxkit::config::generate_default_config();

            if let Some(path) = output {
                std::fs::write(&path, content)
                    .with_context(|| format!("writing config to {:?}", path))?;
                println!("Config written to {:?}", path);
            } else {
                print!("{}", content);
            }
        }
    }

    Ok(())
}

/// Load the config while a warn-level stderr subscriber is active, since the
/// configured logging is only known afterwards
fn load_config(path: Option<&Path>, url: Option<&str>, org: Option<&str>) -> anyhow::Result<Config> {
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("fluxkit=warn"))
        .with_writer(std::io::stderr)
        .finish();

    let mut config = tracing::subscriber::with_default(bootstrap, || match path {
        Some(path) => Config::load_with_env(path),
        None => Ok(Config::load_default()),
    })?;

    if let Some(url) = url {
        config.connection.url = url.to_string();
    }
    if let Some(org) = org {
        config.connection.org = org.to_string();
    }
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fluxkit={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[allow(clippy::too_many_arguments)]
fn build_query(
    bucket: &str,
    start: &str,
    stop: Option<&str>,
    filters: &[String],
    window: Option<&str>,
    aggregate: &str,
    pivot: bool,
    limit: Option<usize>,
) -> anyhow::Result<Query> {
    let mut query = Query::from_bucket(bucket)?;

    query = match stop {
        Some(stop) => query.range_between(start, stop)?,
        None => query.range(start)?,
    };

    let predicates = filters
        .iter()
        .map(|f| {
            let (column, value) = split_pair(f)?;
            Ok(row(column).eq(parse_literal(value))?)
        })
        .collect::<anyhow::Result<Vec<Predicate>>>()?;
    if let Some(predicate) = Predicate::all(predicates) {
        query = query.filter(predicate);
    }

    if let Some(every) = window {
        let Some(func) = AggregateFn::from_str(aggregate) else {
            bail!("Unknown aggregate function: {}", aggregate);
        };
        query = query.aggregate_window(every, func, false)?;
    }
    if pivot {
        query = query.pivot();
    }
    if let Some(n) = limit {
        query = query.limit(n);
    }

    Ok(query)
}

fn build_point(
    name: &str,
    fields: &[String],
    tags: &[String],
    time: Option<&str>,
    precision: Precision,
) -> anyhow::Result<Measurement> {
    let fields = fields
        .iter()
        .map(|f| split_pair(f).map(|(k, v)| (k.to_string(), parse_field(v))))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let tags = tags
        .iter()
        .map(|t| split_pair(t).map(|(k, v)| (k.to_string(), v.to_string())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let point = Measurement::new(name, fields)?.tags(tags);

    Ok(match time {
        None => point,
        Some(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                point.time_at(dt.with_timezone(&Utc), precision)?
            } else if let Ok(ts) = s.parse::<i64>() {
                point.time_normalized(ts, precision)?
            } else {
                bail!("Invalid timestamp format: {}", s);
            }
        }
    })
}

fn split_pair(s: &str) -> anyhow::Result<(&str, &str)> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k, v)),
        _ => bail!("Expected key=value, got `{}`", s),
    }
}

/// Best-effort typing of a command-line filter value
fn parse_literal(s: &str) -> Literal {
    if let Ok(i) = s.parse::<i64>() {
        Literal::Int(i)
    } else if let Some(f) = s.parse::<f64>().ok().filter(|f| f.is_finite()) {
        Literal::Float(f)
    } else if let Ok(b) = s.parse::<bool>() {
        Literal::Bool(b)
    } else {
        Literal::String(unquote(s).to_string())
    }
}

/// Field values follow line-protocol notation
fn parse_field(s: &str) -> FieldValue {
    if let Some(i) = s.strip_suffix('i').and_then(|n| n.parse::<i64>().ok()) {
        FieldValue::Int(i)
    } else if let Some(u) = s.strip_suffix('u').and_then(|n| n.parse::<u64>().ok()) {
        FieldValue::UInt(u)
    } else if let Ok(f) = s.parse::<f64>() {
        FieldValue::Float(f)
    } else {
        match s {
            "t" | "T" | "true" | "True" | "TRUE" => FieldValue::Bool(true),
            "f" | "F" | "false" | "False" | "FALSE" => FieldValue::Bool(false),
            _ => FieldValue::String(unquote(s).to_string()),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn print_table(records: &[Record]) {
    if records.is_empty() {
        println!("No results.");
        return;
    }

    // column order of first appearance
    let mut columns: Vec<&str> = Vec::new();
    for column in records.iter().flat_map(|record| record.keys()) {
        if column != "result" && column != "table" && !columns.contains(&column) {
            columns.push(column);
        }
    }

    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(*c).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<w$}", v, w = *w))
            .collect();
        println!("{}", line.join("  "));
    }

    println!();
    println!("{} rows", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        let query = build_query(
            "telemetry",
            "-1h",
            None,
            &["_measurement=cpu".to_string(), "core=3".to_string()],
            Some("5m"),
            "max",
            true,
            Some(10),
        )
        .unwrap();

        assert_eq!(
            query.to_string(),
            "from(bucket: \"telemetry\")\n\
             |> range(start: -1h)\n\
             |> filter(fn: (r) => r._measurement == \"cpu\" and r.core == 3)\n\
             |> aggregateWindow(every: 5m, fn: max, createEmpty: false)\n\
             |> pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\")\n\
             |> limit(n: 10, offset: 0)"
        );
    }

    #[test]
    fn test_build_query_rejects_bad_input() {
        assert!(build_query("b", "-1h", None, &["novalue".to_string()], None, "mean", false, None).is_err());
        assert!(build_query("b", "-1h", None, &[], Some("5m"), "nope", false, None).is_err());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("42"), Literal::Int(42));
        assert_eq!(parse_literal("0.5"), Literal::Float(0.5));
        assert_eq!(parse_literal("true"), Literal::Bool(true));
        assert_eq!(parse_literal("server01"), Literal::String("server01".to_string()));
        assert_eq!(parse_literal("\"42\""), Literal::String("42".to_string()));
    }

    #[test]
    fn test_build_point() {
        let point = build_point(
            "cpu",
            &["usage=0.5".to_string(), "cores=4i".to_string(), "ok=t".to_string()],
            &["host=a".to_string()],
            Some("1625659548"),
            Precision::Ns,
        )
        .unwrap();

        assert_eq!(
            point.to_line(),
            "cpu,host=a cores=4i,ok=t,usage=0.5 1625659548000000000"
        );

        let point = build_point(
            "m",
            &["s=\"hi\"".to_string()],
            &[],
            Some("2021-07-07T12:05:48Z"),
            Precision::Ns,
        )
        .unwrap();
        assert_eq!(point.to_line(), "m s=\"hi\" 1625659548000000000");

        assert!(build_point("m", &["v=1".to_string()], &[], Some("yesterday"), Precision::Ns).is_err());
    }

    #[test]
    fn test_build_point_uses_write_precision() {
        let fields = ["v=1".to_string()];

        let point = build_point("m", &fields, &[], Some("1625659548000"), Precision::Ms).unwrap();
        assert_eq!(point.to_line(), "m v=1 1625659548000");

        let point = build_point("m", &fields, &[], Some("1625659548000000000"), Precision::S).unwrap();
        assert_eq!(point.to_line(), "m v=1 1625659548");

        let point = build_point("m", &fields, &[], Some("2021-07-07T12:05:48.5Z"), Precision::Ms).unwrap();
        assert_eq!(point.to_line(), "m v=1 1625659548500");
    }

    #[test]
    fn test_load_config_applies_cli_overrides() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\nurl = \"http://db:8086\"\norg = \"acme\"").unwrap();

        let config = load_config(Some(file.path()), None, Some("other")).unwrap();
        assert_eq!(config.connection.url, "http://db:8086");
        assert_eq!(config.connection.org, "other");

        assert!(load_config(Some(Path::new("/nonexistent/fluxkit.toml")), None, None).is_err());
    }
}
