use std::{error::Error, path::Path};

use clap::Parser;
use duckdb::types::Value;
use itertools::Itertools;
use jiff::civil::Date;
use lode::{
    config::{ConfigProvider, JsonConfigFile},
    db::{
        loader::list_tables,
        prod_db::ProdDb,
        query::{Granularity, Literal, Predicate, SelectorArgs, Value as PredicateValue},
    },
    interval::date::parse_date,
    utils::lib_duckdb::{fetch_frame, value_as_i64, value_to_string, Frame},
};
use log::info;
use tabled::{builder::Builder, settings::Style};

/// Build the SQL for a sharded table and optionally run it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Logical table name, e.g. nodal_prices
    #[arg(short, long, required_unless_present = "list")]
    table: Option<String>,

    /// Database key in the config file.  Defaults to the first one holding the table.
    #[arg(long)]
    database: Option<String>,

    /// A single date, e.g. 14-12-2013
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<Date>,

    /// Comma separated dates, e.g. 14-05-2009,31-03-2012
    #[arg(long, value_delimiter = ',', value_parser = parse_date_arg)]
    dates: Vec<Date>,

    #[arg(long, value_parser = parse_date_arg)]
    begin: Option<Date>,

    #[arg(long, value_parser = parse_date_arg)]
    end: Option<Date>,

    /// How a date range is split: Year or Month
    #[arg(long, default_value = "Year")]
    range_break: Granularity,

    /// Keep rows where `col` equals one of the values, e.g. Node=OTA2201,HAY2201
    #[arg(long = "eq")]
    equal: Vec<String>,

    /// Drop rows where `col` equals one of the values
    #[arg(long = "ne")]
    not_equal: Vec<String>,

    /// Lower bound, e.g. Price=0
    #[arg(long)]
    min: Vec<String>,

    /// Upper bound, e.g. Price=1000
    #[arg(long)]
    max: Vec<String>,

    /// Inclusive range, e.g. Trading_period=1..10
    #[arg(long)]
    between: Vec<String>,

    /// Run the statements and print the result instead of the SQL
    #[arg(short = 'x', long)]
    execute: bool,

    /// With --execute, print rows as JSON
    #[arg(long)]
    json: bool,

    /// List the configured databases and their tables
    #[arg(long)]
    list: bool,
}

fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn split_arg(arg: &str) -> Result<(&str, &str), Box<dyn Error>> {
    match arg.split_once('=') {
        Some((col, value)) if !col.trim().is_empty() => Ok((col.trim(), value)),
        _ => Err(format!("expected col=value, got {}", arg).into()),
    }
}

fn membership(arg: &str, exclude: bool) -> Result<Predicate, Box<dyn Error>> {
    let (col, values) = split_arg(arg)?;
    let values: Vec<Literal> = values.split(',').map(Literal::infer).collect();
    let value: PredicateValue = if values.len() == 1 {
        values[0].clone().into()
    } else {
        values.into()
    };
    Ok(if exclude {
        Predicate::exclusion(col, value)
    } else {
        Predicate::equality(col, value)
    })
}

fn predicates(args: &Args) -> Result<Vec<Predicate>, Box<dyn Error>> {
    let mut out = Vec::new();
    for arg in &args.equal {
        out.push(membership(arg, false)?);
    }
    for arg in &args.not_equal {
        out.push(membership(arg, true)?);
    }
    for arg in &args.min {
        let (col, value) = split_arg(arg)?;
        out.push(Predicate::minimum(col, Literal::infer(value)));
    }
    for arg in &args.max {
        let (col, value) = split_arg(arg)?;
        out.push(Predicate::maximum(col, Literal::infer(value)));
    }
    for arg in &args.between {
        let (col, range) = split_arg(arg)?;
        let (low, high) = range
            .split_once("..")
            .ok_or_else(|| format!("expected col=low..high, got {}", arg))?;
        out.push(Predicate::range(col, Literal::infer(low), Literal::infer(high)));
    }
    Ok(out)
}

fn ascii_table(frame: &Frame) -> tabled::Table {
    let mut builder = Builder::new();
    builder.push_record(frame.columns.clone());
    for row in &frame.rows {
        builder.push_record(row.iter().map(value_to_string).collect::<Vec<String>>());
    }
    let mut table = builder.build();
    table.with(Style::empty());
    table
}

fn json_rows(frame: &Frame) -> serde_json::Value {
    let rows = frame
        .rows
        .iter()
        .map(|row| {
            let obj: serde_json::Map<String, serde_json::Value> = frame
                .columns
                .iter()
                .zip(row.iter())
                .map(|(column, value)| {
                    let v = match value {
                        Value::Null => serde_json::Value::Null,
                        Value::Boolean(b) => serde_json::Value::Bool(*b),
                        Value::Text(s) => serde_json::Value::String(s.clone()),
                        _ => match value_as_i64(value) {
                            Some(i) => serde_json::Value::from(i),
                            None => serde_json::Value::String(value_to_string(value)),
                        },
                    };
                    (column.clone(), v)
                })
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect_vec();
    serde_json::Value::Array(rows)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str()))?;

    let provider = JsonConfigFile::from_env()?;
    let config = provider.config()?;

    if args.list {
        for database in config.list_databases() {
            println!("{}: {}", database, config.list_tables(database)?.join(", "));
        }
        return Ok(());
    }

    let table = args.table.clone().ok_or("--table is required")?;
    let database = match &args.database {
        Some(key) => key.clone(),
        None => config.database_for(&table)?.0.to_string(),
    };
    let schema = config.table(&database, &table)?;

    let dates = SelectorArgs {
        date: args.date,
        dates: Some(args.dates.clone()),
        begin: args.begin,
        end: args.end,
    };
    let statements = schema.statements(&table, &dates, args.range_break, &predicates(&args)?)?;

    if !args.execute {
        for statement in &statements {
            println!("{}", statement);
        }
        return Ok(());
    }

    let db = ProdDb::new(&config)?;
    let conn = db.connect(&database, true)?;
    let existing = list_tables(&conn)?;
    let missing = statements
        .iter()
        .map(|e| e.shard().table_name(&table))
        .filter(|e| !existing.contains(e))
        .collect_vec();
    if !missing.is_empty() {
        return Err(format!("missing tables in {}: {}", database, missing.join(", ")).into());
    }
    let frame = fetch_frame(&conn, &statements)?;
    info!("{} rows from {} statement(s)", frame.len(), statements.len());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_rows(&frame))?);
    } else {
        println!("{}", ascii_table(&frame));
    }
    Ok(())
}
