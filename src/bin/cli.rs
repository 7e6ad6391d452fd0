//! FlatDB - CLI Client

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use tracing_subscriber::EnvFilter;

use flatdb::executor::{write_csv, Delete, GroupBy, Predicate, Query, Sort, SortKey, Update};
use flatdb::{Record, SortConfig, Table};

const USAGE: &str = r#"Usage:
  flatdb-cli create <file> <col>...
  flatdb-cli append <file> <value>...
  flatdb-cli scan <file> [--where col=value]... [--limit N]
  flatdb-cli count <file> <col>...
  flatdb-cli sort <file> <col> [--desc] [--numeric] [--limit N] [--chunk-size N]
                  [--debug-dir DIR] [--config FILE]
  flatdb-cli delete <file> [--where col=value]...
  flatdb-cli update <file> <col> <value> [--where col=value]...

Logging is controlled by RUST_LOG (default: warn)."#;

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    positional: Vec<String>,
    wheres: Vec<(String, String)>,
    limit: Option<usize>,
    desc: bool,
    numeric: bool,
    chunk_size: Option<usize>,
    debug_dir: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} requires a value", flag))
            };
            match arg.as_str() {
                "--where" | "-w" => {
                    let clause = value(arg.as_str())?;
                    let (column, literal) = clause
                        .split_once('=')
                        .ok_or_else(|| anyhow!("expected col=value, got '{}'", clause))?;
                    parsed.wheres.push((column.to_string(), literal.to_string()));
                }
                "--limit" | "-n" => {
                    parsed.limit = Some(value(arg.as_str())?.parse().context("invalid --limit")?);
                }
                "--chunk-size" => {
                    parsed.chunk_size = Some(value(arg.as_str())?.parse().context("invalid --chunk-size")?);
                }
                "--debug-dir" => parsed.debug_dir = Some(value(arg.as_str())?.into()),
                "--config" => parsed.config = Some(value(arg.as_str())?.into()),
                "--desc" => parsed.desc = true,
                "--numeric" => parsed.numeric = true,
                flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
                _ => parsed.positional.push(arg.clone()),
            }
        }

        Ok(parsed)
    }

    /// Positional argument `index`, named `what` in errors
    fn arg(&self, index: usize, what: &str) -> anyhow::Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing {}", what))
    }

    /// `--where` clauses as equality filters on `table`
    fn filters(&self, table: &Table) -> anyhow::Result<Vec<Predicate>> {
        self.wheres
            .iter()
            .map(|(column, value)| Ok(table.column(column)?.equals(value.as_str())))
            .collect()
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn create(args: &Args) -> anyhow::Result<()> {
    let file = args.arg(0, "table file")?;
    let columns = &args.positional[1..];
    Table::create(file, columns)?;
    println!("Created {} ({})", file, columns.join(", "));
    Ok(())
}

fn append(args: &Args) -> anyhow::Result<()> {
    let mut table = Table::open(args.arg(0, "table file")?)?;
    let values = &args.positional[1..];
    let columns = table.schema().columns().to_vec();
    if values.len() != columns.len() {
        bail!(
            "expected {} values ({}), got {}",
            columns.len(),
            columns.join(", "),
            values.len()
        );
    }
    let record: Record = columns.iter().map(String::as_str).zip(values.iter().cloned()).collect();
    table.append(&record)?;
    Ok(())
}

fn scan(args: &Args, out: impl Write) -> anyhow::Result<()> {
    let table = Table::open(args.arg(0, "table file")?)?;
    let mut query = Query::new([&table]);
    for predicate in args.filters(&table)? {
        query = query.filter(predicate);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    query.write_csv(out)?;
    Ok(())
}

fn count(args: &Args, out: impl Write) -> anyhow::Result<()> {
    let table = Table::open(args.arg(0, "table file")?)?;
    let columns = args.positional[1..]
        .iter()
        .map(|name| table.column(name))
        .collect::<flatdb::Result<Vec<_>>>()?;
    if columns.is_empty() {
        bail!("count needs at least one grouping column");
    }

    let mut query = Query::new([&table]);
    for predicate in args.filters(&table)? {
        query = query.filter(predicate);
    }
    let group = GroupBy::new(query, columns);
    write_csv(out, &group.columns(), group.count()?.into_iter().map(Ok))?;
    Ok(())
}

fn sort(args: &Args, out: impl Write) -> anyhow::Result<()> {
    let table = Table::open(args.arg(0, "table file")?)?;
    let column = table.column(args.arg(1, "sort column")?)?;

    let mut config = match &args.config {
        Some(path) => SortConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SortConfig::new(),
    };
    if let Some(chunk_size) = args.chunk_size {
        config = config.chunk_size(chunk_size);
    }
    if let Some(dir) = &args.debug_dir {
        config = config.debug_dir(dir);
    }

    let key = if args.numeric {
        SortKey::float(&column)
    } else {
        SortKey::column(&column)
    };
    let mut query = Query::new([&table]);
    for predicate in args.filters(&table)? {
        query = query.filter(predicate);
    }
    let mut sort = Sort::new(query, key).reverse(args.desc).config(config);
    if let Some(limit) = args.limit {
        sort = sort.limit(limit);
    }
    sort.write_csv(out)?;
    Ok(())
}

fn delete(args: &Args) -> anyhow::Result<()> {
    let mut table = Table::open(args.arg(0, "table file")?)?;
    let filters = args.filters(&table)?;

    let mut delete = Delete::new(&mut table);
    for predicate in filters {
        delete = delete.filter(predicate);
    }
    println!("{} row(s) deleted", delete.execute()?);
    Ok(())
}

fn update(args: &Args) -> anyhow::Result<()> {
    let mut table = Table::open(args.arg(0, "table file")?)?;
    let column = table.column(args.arg(1, "column")?)?;
    let value = args.arg(2, "value")?.to_string();
    let filters = args.filters(&table)?;

    let mut update = Update::new(&mut table, &column, value)?;
    for predicate in filters {
        update = update.filter(predicate);
    }
    println!("{} row(s) updated", update.execute()?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let argv: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = argv.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let args = Args::parse(rest)?;
    let stdout = io::stdout().lock();

    match command.as_str() {
        "create" => create(&args),
        "append" => append(&args),
        "scan" => scan(&args, stdout),
        "count" => count(&args, stdout),
        "sort" => sort(&args, stdout),
        "delete" => delete(&args),
        "update" => update(&args),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}
