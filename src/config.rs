//! Where the databases live and how their tables are sharded.
//!
//! The configuration is a JSON5 file keyed by database name:
//!
//! ```json5
//! {
//!   nodal_database: {
//!     duckdb_path: "/home/user/Data/DuckDB/nzem/nodal.duckdb",
//!     schemas: {
//!       nodal_prices: { split_by_year: true, split_years: [2013, 2014], date_column: "Trading_date" },
//!     },
//!   },
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::nzem::build_statements;
use crate::db::query::{Granularity, Predicate, QueryError, SelectorArgs, Statement};

pub const CONFIG_ENV_VAR: &str = "LODE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed reading config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed parsing config file {path}: {source}")]
    Parse { path: PathBuf, source: json5::Error },
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("unknown database {0}")]
    UnknownDatabase(String),
    #[error("unknown table {table} in database {database}")]
    UnknownTable { database: String, table: String },
    #[error("no database is configured with table {0}")]
    NoDatabaseFor(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub split_by_year: bool,
    #[serde(default)]
    pub split_years: Vec<i16>,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// strftime format of dates in the CSV files loaded into this table.
    #[serde(default)]
    pub date_format: Option<String>,
}

fn default_date_column() -> String {
    "trading_date".to_string()
}

impl TableConfig {
    /// Fail if a statement targets a year shard that isn't configured.
    pub fn check_shards(&self, table: &str, statements: &[Statement]) -> Result<(), QueryError> {
        if !self.split_by_year {
            return Err(QueryError::Configuration(format!(
                "table {} is not split by year",
                table
            )));
        }
        if self.split_years.is_empty() {
            return Ok(());
        }
        for statement in statements {
            let year = statement.shard().year();
            if !self.split_years.contains(&year) {
                return Err(QueryError::Configuration(format!(
                    "no shard {} configured",
                    statement.shard().table_name(table)
                )));
            }
        }
        Ok(())
    }

    /// Compile a request against this table and make sure every statement
    /// lands on a configured shard.  Tables that aren't split by year can't be
    /// queried by date.
    pub fn statements(
        &self,
        table: &str,
        dates: &SelectorArgs,
        range_break: Granularity,
        predicates: &[Predicate],
    ) -> Result<Vec<Statement>, QueryError> {
        let statements =
            build_statements(table, dates, &self.date_column, range_break, predicates)?;
        self.check_shards(table, &statements)?;
        Ok(statements)
    }

    /// Names of all physical tables behind `table`.
    pub fn physical_tables(&self, table: &str) -> Vec<String> {
        if self.split_by_year {
            self.split_years
                .iter()
                .map(|year| format!("{}_{}", table, year))
                .collect()
        } else {
            vec![table.to_string()]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub duckdb_path: String,
    #[serde(default)]
    pub schemas: BTreeMap<String, TableConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Config {
    pub fn parse(path: &Path, content: &str) -> Result<Config, ConfigError> {
        json5::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn database(&self, key: &str) -> Result<&DatabaseConfig, ConfigError> {
        self.databases
            .get(key)
            .ok_or_else(|| ConfigError::UnknownDatabase(key.to_string()))
    }

    pub fn table(&self, database: &str, table: &str) -> Result<&TableConfig, ConfigError> {
        self.database(database)?
            .schemas
            .get(table)
            .ok_or_else(|| ConfigError::UnknownTable {
                database: database.to_string(),
                table: table.to_string(),
            })
    }

    /// First database, in key order, that holds `table`.
    pub fn database_for(&self, table: &str) -> Result<(&str, &DatabaseConfig), ConfigError> {
        self.databases
            .iter()
            .find(|(_, db)| db.schemas.contains_key(table))
            .map(|(k, db)| (k.as_str(), db))
            .ok_or_else(|| ConfigError::NoDatabaseFor(table.to_string()))
    }

    /// Databases that have table schemas configured.
    pub fn list_databases(&self) -> Vec<&str> {
        self.databases
            .iter()
            .filter(|(_, db)| !db.schemas.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn list_tables(&self, database: &str) -> Result<Vec<&str>, ConfigError> {
        Ok(self
            .database(database)?
            .schemas
            .keys()
            .map(|e| e.as_str())
            .collect())
    }
}

/// Hands out the current configuration.  Callers ask for it each time they
/// need it instead of holding on to a global copy.
pub trait ConfigProvider {
    fn config(&self) -> Result<Config, ConfigError>;
}

impl ConfigProvider for Config {
    fn config(&self) -> Result<Config, ConfigError> {
        Ok(self.clone())
    }
}

/// Re-reads the file on every call, so edits are picked up without a restart.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    pub path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> JsonConfigFile {
        JsonConfigFile { path: path.into() }
    }

    /// Use the file named by the `LODE_CONFIG` environment variable.
    pub fn from_env() -> Result<JsonConfigFile, ConfigError> {
        let path = env::var(CONFIG_ENV_VAR).map_err(|_| ConfigError::MissingEnv(CONFIG_ENV_VAR))?;
        Ok(JsonConfigFile::new(path))
    }
}

impl ConfigProvider for JsonConfigFile {
    fn config(&self) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        Config::parse(&self.path, &content)
    }
}
