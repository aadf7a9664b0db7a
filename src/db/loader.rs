//! Bulk load market CSV files into year shards.
//!
//! The shard is taken from the file name: `final_prices_201406.csv` goes to
//! `<table>_2014`.  Loading is a DuckDB `COPY`, so the target table must exist.

use std::fs;
use std::path::{Path, PathBuf};

use duckdb::Connection;
use itertools::Itertools;
use jiff::civil::Date;
use log::{info, warn};
use regex::Regex;
use thiserror::Error;

use crate::config::TableConfig;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("can't infer a year from file name {0}")]
    FileYear(String),
    #[error("table {0} has no columns to load into, does it exist?")]
    NoColumns(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Inserted { table: String, rows: usize },
    /// The rows were rejected by a key constraint, most likely loaded before.
    AlreadyLoaded { table: String },
}

/// Infer the year of the data in a file from the first run of digits in its
/// name: `2004`, `200406` or `20040628` all give `2004`.
pub fn shard_year_from_filename(path: &Path) -> Result<i16, LoadError> {
    let name = path
        .file_name()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let err = || LoadError::FileYear(name.clone());
    let re = Regex::new(r"\d+").map_err(|_| err())?;
    let digits = re.find(&name).ok_or_else(err)?.as_str();
    let year = match digits.len() {
        4 => digits.parse::<i16>().map_err(|_| err())?,
        6 => Date::strptime("%Y%m%d", format!("{}01", digits))
            .map_err(|_| err())?
            .year(),
        8 => Date::strptime("%Y%m%d", digits).map_err(|_| err())?.year(),
        _ => return Err(err()),
    };
    Ok(year)
}

/// Name of the physical table a file belongs to.
pub fn target_table(table: &str, schema: &TableConfig, path: &Path) -> Result<String, LoadError> {
    if schema.split_by_year {
        Ok(format!("{}_{}", table, shard_year_from_filename(path)?))
    } else {
        Ok(table.to_string())
    }
}

/// Column names of a table in declaration order.
pub fn get_column_names(conn: &Connection, table: &str) -> Result<Vec<String>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_name = ? ORDER BY ordinal_position;",
    )?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn list_tables(conn: &Connection) -> Result<Vec<String>, duckdb::Error> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_type = 'BASE TABLE' ORDER BY table_name;",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

fn count_rows(conn: &Connection, table: &str) -> Result<usize, duckdb::Error> {
    let n: i64 = conn.query_row(&format!("SELECT count(*) FROM {};", table), [], |row| row.get(0))?;
    Ok(n as usize)
}

/// Does the first line of the file look like a header for these columns?
fn has_header(path: &Path, first_column: &str) -> Result<bool, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let first = rdr.records().next().transpose()?;
    Ok(match first {
        Some(record) => record
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(first_column)),
        None => false,
    })
}

/// Load one CSV file into the shard of `table` it belongs to.
pub fn load_csv(
    conn: &Connection,
    table: &str,
    schema: &TableConfig,
    path: &Path,
) -> Result<LoadOutcome, LoadError> {
    let target = target_table(table, schema, path)?;
    let columns: Vec<String> = get_column_names(conn, &target)?
        .into_iter()
        .filter(|e| !e.to_lowercase().contains("key"))
        .collect();
    if columns.is_empty() {
        return Err(LoadError::NoColumns(target));
    }
    let header = has_header(path, &columns[0])?;

    let mut options = vec![format!("HEADER {}", header)];
    if let Some(format) = &schema.date_format {
        options.push(format!("DATEFORMAT '{}'", format));
    }
    let sql = format!(
        "COPY {}({}) FROM '{}' ({});",
        target,
        columns.iter().join(", "),
        path.display().to_string().replace('\'', "''"),
        options.join(", ")
    );
    let before = count_rows(conn, &target)?;
    match conn.execute_batch(&sql) {
        Ok(()) => {
            let rows = count_rows(conn, &target)?.saturating_sub(before);
            info!("loaded {} rows from {} into {}", rows, path.display(), target);
            Ok(LoadOutcome::Inserted {
                table: target,
                rows,
            })
        }
        Err(e) if e.to_string().contains("Constraint Error") => {
            warn!("rows of {} already exist in {}: {}", path.display(), target, e);
            Ok(LoadOutcome::AlreadyLoaded { table: target })
        }
        Err(e) => Err(e.into()),
    }
}

/// Load every `*.csv` file of a directory, in file name order.
pub fn load_folder(
    conn: &Connection,
    table: &str,
    schema: &TableConfig,
    dir: &Path,
) -> Result<Vec<LoadOutcome>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .sorted()
        .collect();
    let mut outcomes = Vec::new();
    for file in files {
        info!("Attempting to load {}", file.display());
        outcomes.push(load_csv(conn, table, schema, &file)?);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn schema(split_by_year: bool) -> TableConfig {
        TableConfig {
            split_by_year,
            split_years: vec![2014, 2015],
            date_column: "Trading_date".to_string(),
            date_format: Some("%d/%m/%Y".to_string()),
        }
    }

    fn fixture() -> Result<Connection, Box<dyn Error>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r"
    CREATE TABLE nodal_prices_2014 (
        price_key INTEGER DEFAULT 0,
        Node VARCHAR NOT NULL,
        Trading_date DATE NOT NULL,
        Trading_period INTEGER NOT NULL,
        Price DECIMAL(9,2),
        PRIMARY KEY (Node, Trading_date, Trading_period)
    );
    CREATE TABLE nodal_prices_2015 AS SELECT * FROM nodal_prices_2014;
        ",
        )?;
        Ok(conn)
    }

    #[test]
    fn file_year() -> Result<(), Box<dyn Error>> {
        assert_eq!(shard_year_from_filename(Path::new("path/to/filename2004"))?, 2004);
        assert_eq!(shard_year_from_filename(Path::new("path/to/filename200406"))?, 2004);
        assert_eq!(shard_year_from_filename(Path::new("path/to/filename20040628.csv"))?, 2004);
        assert!(shard_year_from_filename(Path::new("path/to/filename05_20040628")).is_err());
        assert!(shard_year_from_filename(Path::new("path/to/prices.csv")).is_err());
        assert!(shard_year_from_filename(Path::new("path/to/prices_201413.csv")).is_err());
        Ok(())
    }

    #[test]
    fn target_tables() -> Result<(), Box<dyn Error>> {
        let path = Path::new("final_prices_20140601.csv");
        assert_eq!(target_table("nodal_prices", &schema(true), path)?, "nodal_prices_2014");
        assert_eq!(target_table("nodal_prices", &schema(false), path)?, "nodal_prices");
        Ok(())
    }

    #[test]
    fn columns_and_tables() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        assert_eq!(
            get_column_names(&conn, "nodal_prices_2014")?,
            vec!["price_key", "Node", "Trading_date", "Trading_period", "Price"]
        );
        assert_eq!(
            list_tables(&conn)?,
            vec!["nodal_prices_2014", "nodal_prices_2015"]
        );
        Ok(())
    }

    #[test]
    fn load_folder_into_shards() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("prices_201406.csv"),
            "Node,Trading_date,Trading_period,Price\nOTA2201,01/06/2014,1,50.10\nHAY2201,01/06/2014,1,49.00\n",
        )?;
        fs::write(
            dir.path().join("prices_201501.csv"),
            "BEN2201,02/01/2015,3,12.50\n",
        )?;
        fs::write(dir.path().join("notes.txt"), "not data")?;

        let outcomes = load_folder(&conn, "nodal_prices", &schema(true), dir.path())?;
        assert_eq!(
            outcomes,
            vec![
                LoadOutcome::Inserted {
                    table: "nodal_prices_2014".to_string(),
                    rows: 2
                },
                LoadOutcome::Inserted {
                    table: "nodal_prices_2015".to_string(),
                    rows: 1
                },
            ]
        );
        let count: i64 =
            conn.query_row("SELECT count(*) FROM nodal_prices_2015 WHERE Node = 'BEN2201'", [], |r| r.get(0))?;
        assert_eq!(count, 1);

        let again = load_csv(
            &conn,
            "nodal_prices",
            &schema(true),
            &dir.path().join("prices_201406.csv"),
        )?;
        assert_eq!(
            again,
            LoadOutcome::AlreadyLoaded {
                table: "nodal_prices_2014".to_string()
            }
        );
        Ok(())
    }

    #[test]
    fn quote_in_path() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("o'neill");
        fs::create_dir(&folder)?;
        let file = folder.join("prices_20150102.csv");
        fs::write(&file, "BEN2201,02/01/2015,3,12.50\n")?;
        assert_eq!(
            load_csv(&conn, "nodal_prices", &schema(true), &file)?,
            LoadOutcome::Inserted {
                table: "nodal_prices_2015".to_string(),
                rows: 1
            }
        );
        Ok(())
    }

    #[test]
    fn missing_table() -> Result<(), Box<dyn Error>> {
        let conn = Connection::open_in_memory()?;
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("prices_2016.csv");
        fs::write(&file, "OTA2201,01/06/2016,1,50.10\n")?;
        assert!(matches!(
            load_csv(&conn, "nodal_prices", &schema(true), &file),
            Err(LoadError::NoColumns(_))
        ));
        Ok(())
    }
}
