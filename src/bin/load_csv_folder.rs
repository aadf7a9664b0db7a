use std::{error::Error, path::PathBuf};

use clap::Parser;
use lode::{
    config::{ConfigProvider, JsonConfigFile},
    db::{
        loader::{load_folder, LoadOutcome},
        prod_db::ProdDb,
    },
};
use log::{info, warn};

/// Load every CSV file of a folder into the year shards of a table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Logical table name, e.g. nodal_prices
    #[arg(short, long)]
    table: String,

    /// Database key in the config file.  Defaults to the first one holding the table.
    #[arg(long)]
    database: Option<String>,

    /// Folder with the CSV files
    folder: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    dotenvy::from_path(PathBuf::from(format!(".env/{}.env", args.env)))?;

    let config = JsonConfigFile::from_env()?.config()?;
    let database = match &args.database {
        Some(key) => key.clone(),
        None => config.database_for(&args.table)?.0.to_string(),
    };
    let schema = config.table(&database, &args.table)?.clone();

    let db = ProdDb::new(&config)?;
    let conn = db.connect(&database, false)?;
    let outcomes = load_folder(&conn, &args.table, &schema, &args.folder)?;

    let (mut rows, mut skipped) = (0, 0);
    for outcome in &outcomes {
        match outcome {
            LoadOutcome::Inserted { rows: n, .. } => rows += n,
            LoadOutcome::AlreadyLoaded { table } => {
                warn!("skipped a file already present in {}", table);
                skipped += 1;
            }
        }
    }
    info!(
        "{} files, {} rows inserted, {} files already loaded",
        outcomes.len(),
        rows,
        skipped
    );
    Ok(())
}
