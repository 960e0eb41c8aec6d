use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use viewsql::config::{self, GeneratorConfig};
use viewsql::dialect::{DialectKind, MaxRows};
use viewsql::query::{
    bind_named_parameters, validate_named_parameters, Filter, QueryContext, SelectRequest, Sort,
    SqlGenerator,
};
use viewsql::schema::{FieldKey, SchemaConfig};

/// viewsql - generate dialect SQL for a table of a YAML schema
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema definition (YAML)
    #[arg(long)]
    schema: PathBuf,

    /// Table to select from, as schema.table
    #[arg(long)]
    table: String,

    /// Comma-separated field keys to select (all columns when omitted)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// URL filter clause, e.g. `Groups/Name~eq=Admins` (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Filter expression, e.g. `Age > $min` (repeatable)
    #[arg(long = "where")]
    wheres: Vec<String>,

    /// URL sort, e.g. `-Created,DisplayName`
    #[arg(long)]
    sort: Option<String>,

    /// Maximum rows to return
    #[arg(long, conflicts_with = "no_rows")]
    max_rows: Option<u64>,

    /// Return the result shape without rows
    #[arg(long)]
    no_rows: bool,

    #[arg(long, default_value_t = 0)]
    offset: u64,

    #[arg(long)]
    distinct: bool,

    /// Add a default sort even without pagination
    #[arg(long)]
    force_sort: bool,

    /// Named parameter value as name=value (repeatable); JSON values are accepted
    #[arg(long = "param")]
    params: Vec<String>,

    /// User recorded by column audit logging
    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    container: Option<String>,

    /// Generator configuration file (YAML); environment variables otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    dialect: Option<DialectKind>,

    #[arg(long)]
    max_lookup_depth: Option<usize>,

    #[arg(long)]
    default_sort_max_columns: Option<usize>,

    /// Reject filter expressions that fail to parse or bind
    #[arg(long)]
    strict_filters: bool,

    /// Wrap the generated SQL in marker comments
    #[arg(long)]
    dev_mode: bool,
}

impl Cli {
    fn cli_config(&self, base: &GeneratorConfig) -> config::CliConfig {
        config::CliConfig {
            dialect: self.dialect.unwrap_or(base.dialect),
            max_lookup_depth: self.max_lookup_depth.unwrap_or(base.max_lookup_depth),
            default_sort_max_columns: self
                .default_sort_max_columns
                .unwrap_or(base.default_sort_max_columns),
            strict_filters: self.strict_filters || base.strict_filters,
            dev_mode: self.dev_mode || base.dev_mode,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<GeneratorConfig> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_yaml_file(path)?,
        None => GeneratorConfig::from_env()?,
    };
    let overrides = GeneratorConfig::from_cli(cli.cli_config(&config))?;
    config.merge(overrides);
    Ok(config)
}

fn parse_params(params: &[String]) -> anyhow::Result<HashMap<String, serde_json::Value>> {
    params
        .iter()
        .map(|p| {
            let (name, raw) = p
                .split_once('=')
                .ok_or_else(|| anyhow!("Parameter '{}' is not of the form name=value", p))?;
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    log::debug!("Generator configuration: {:?}", config);

    let catalog = SchemaConfig::from_yaml_file(&cli.schema)?.into_catalog()?;
    let mut ctx = QueryContext::new(Arc::new(catalog));
    if let Some(user) = &cli.user {
        ctx = ctx.with_user(user.clone());
    }
    if let Some(container) = &cli.container {
        ctx = ctx.with_container(container.clone());
    }

    let (schema, table_name) = cli
        .table
        .split_once('.')
        .ok_or_else(|| anyhow!("Table '{}' must be given as schema.table", cli.table))?;
    let table = ctx
        .catalog
        .table(schema, table_name)
        .with_context(|| format!("Unknown table {}", cli.table))?;

    let generator = SqlGenerator::new(config);
    let mut request = SelectRequest::new(Arc::clone(&table))
        .with_offset(cli.offset)
        .with_distinct(cli.distinct)
        .with_force_sort(cli.force_sort)
        .with_max_rows(match (cli.no_rows, cli.max_rows) {
            (true, _) => MaxRows::NoRows,
            (false, Some(n)) => MaxRows::Limit(n),
            (false, None) => MaxRows::All,
        });

    if !cli.columns.is_empty() {
        let keys: Vec<FieldKey> = cli.columns.iter().map(|c| FieldKey::from_string(c)).collect();
        let columns = generator.get_columns(&ctx, &table, &keys, &[]);
        if columns.len() < keys.len() {
            log::warn!(
                "Ignoring unresolvable columns: {:?}",
                keys.iter()
                    .filter(|k| !columns.iter().any(|(key, _)| key == *k))
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
            );
        }
        request = request.with_columns(columns.into_iter().map(|(_, c)| c).collect());
    }

    if !cli.filters.is_empty() || !cli.wheres.is_empty() {
        let mut filter = Filter::new();
        for clause in &cli.filters {
            filter.parse_url_clause(clause)?;
        }
        for text in &cli.wheres {
            filter.add_where_clause(text.clone());
        }
        request = request.with_filter(filter);
    }
    if let Some(sort) = &cli.sort {
        request = request.with_sort(Sort::parse_url(sort));
    }

    let result = generator.get_select_sql(&ctx, request)?;
    for warning in &result.warnings {
        log::warn!("{}", warning);
    }
    if !result.unresolved.is_empty() {
        log::warn!("Dropped unresolved filter/sort columns: {:?}", result.unresolved);
    }
    if !result.logging.is_empty() {
        log::info!(
            "Column access logged for {:?}: {:?}",
            result.logging.user,
            result.logging.logged_columns
        );
    }

    let bound = bind_named_parameters(&result.fragment, &parse_params(&cli.params)?);
    validate_named_parameters(&bound)?;

    println!("{}", bound.to_debug_sql());
    log::info!(
        "Output columns: {}",
        result
            .output_columns
            .iter()
            .map(|c| c.alias.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn main() {
    // Defaults to WARN, can be overridden with RUST_LOG
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
