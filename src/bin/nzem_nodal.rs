use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use jiff::civil::Date;
use lode::{
    config::{ConfigProvider, JsonConfigFile},
    db::{
        nzem::{
            nodal_demand::{ExcludedNodes, NodalDemandQuery},
            nodal_prices::NodalPriceQuery,
            node_meta::{Aggregation, NodeMeta},
            PeriodFilter,
        },
        prod_db::ProdDb,
        query::{Granularity, SelectorArgs},
    },
    interval::date::{format_dmy, parse_date},
};
use log::info;
use rust_decimal::Decimal;
use tabled::{builder::Builder, settings::Style};

/// Nodal prices or demand, optionally joined with node metadata.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

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

    #[arg(long, default_value = "Year")]
    range_break: Granularity,

    /// Comma separated trading periods, e.g. 1,2,48
    #[arg(long, value_delimiter = ',')]
    periods: Vec<u8>,

    /// Comma separated nodes, e.g. OTA2201,HAY2201
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// CSV file with node attributes, first column Node
    #[arg(long)]
    meta: Option<PathBuf>,

    /// Combine the values by this node attribute, e.g. Island.  Needs --meta.
    #[arg(long, requires = "meta")]
    group_by: Option<String>,

    /// sum, mean, min or max
    #[arg(long, default_value = "sum")]
    agg: Aggregation,

    #[command(subcommand)]
    dataset: Dataset,
}

#[derive(Subcommand, Debug)]
enum Dataset {
    /// Final nodal prices
    Prices {
        #[arg(long)]
        min: Option<Decimal>,
        #[arg(long)]
        max: Option<Decimal>,
    },
    /// Reconciled nodal demand
    Demand {
        #[arg(long)]
        min: Option<Decimal>,
        #[arg(long)]
        max: Option<Decimal>,
        /// `wind`, or comma separated nodes to leave out
        #[arg(long)]
        exclude: Option<ExcludedNodes>,
    },
}

fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn non_empty<T>(values: &[T]) -> Option<Vec<T>>
where
    T: Clone,
{
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn print_grouped(attribute: &str, aggregation: Aggregation, grouped: &[(String, Decimal)]) {
    let mut builder = Builder::new();
    builder.push_record([attribute.to_string(), aggregation.to_string()]);
    for (key, value) in grouped {
        builder.push_record([key.clone(), value.to_string()]);
    }
    let mut table = builder.build();
    table.with(Style::empty());
    println!("{}", table);
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    dotenvy::from_path(PathBuf::from(format!(".env/{}.env", args.env)))?;

    let db = ProdDb::new(&JsonConfigFile::from_env()?.config()?)?;
    let dates = SelectorArgs {
        date: args.date,
        dates: non_empty(&args.dates),
        begin: args.begin,
        end: args.end,
    };
    let periods = PeriodFilter {
        periods: non_empty(&args.periods),
        ..Default::default()
    };
    let meta = match &args.meta {
        Some(path) => Some(NodeMeta::from_path(path)?),
        None => None,
    };

    // (node, date, period, value) for every row
    let rows: Vec<(String, Date, u8, Decimal)> = match &args.dataset {
        Dataset::Prices { min, max } => {
            let archive = db.nzem_nodal_prices()?;
            let conn = archive.connect()?;
            let query = NodalPriceQuery {
                dates,
                periods,
                nodes: non_empty(&args.nodes),
                minimum_price: *min,
                maximum_price: *max,
                range_break: args.range_break,
            };
            if let (Some(meta), Some(attribute)) = (&meta, &args.group_by) {
                let grouped = archive.get_grouped(&conn, &query, meta, attribute, args.agg)?;
                print_grouped(attribute, args.agg, &grouped.into_iter().collect::<Vec<_>>());
                return Ok(());
            }
            archive
                .get_data(&conn, &query)?
                .into_iter()
                .map(|e| (e.node, e.trading_date, e.trading_period, e.price))
                .collect()
        }
        Dataset::Demand { min, max, exclude } => {
            let archive = db.nzem_nodal_demand()?;
            let conn = archive.connect()?;
            let query = NodalDemandQuery {
                dates,
                periods,
                nodes: non_empty(&args.nodes),
                minimum_demand: *min,
                maximum_demand: *max,
                excluded: exclude.clone(),
                range_break: args.range_break,
            };
            if let (Some(meta), Some(attribute)) = (&meta, &args.group_by) {
                let grouped = archive.get_grouped(&conn, &query, meta, attribute, args.agg)?;
                print_grouped(attribute, args.agg, &grouped.into_iter().collect::<Vec<_>>());
                return Ok(());
            }
            archive
                .get_data(&conn, &query)?
                .into_iter()
                .map(|e| (e.node, e.trading_date, e.trading_period, e.demand))
                .collect()
        }
    };
    info!("{} rows", rows.len());

    let mut builder = Builder::new();
    let mut header = vec![
        "node".to_string(),
        "date".to_string(),
        "period".to_string(),
        "value".to_string(),
    ];
    if let Some(meta) = &meta {
        header.extend(meta.attributes.iter().cloned());
    }
    builder.push_record(header);
    for (node, date, period, value) in rows {
        let mut record = vec![node.clone(), format_dmy(date), period.to_string(), value.to_string()];
        if let Some(meta) = &meta {
            // inner join, same as the grouped output
            let attributes: Option<Vec<String>> = meta
                .attributes
                .iter()
                .map(|a| meta.attribute(&node, a).map(|e| e.to_string()))
                .collect();
            match attributes {
                Some(attributes) => record.extend(attributes),
                None => continue,
            }
        }
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::empty());
    println!("{}", table);
    Ok(())
}
