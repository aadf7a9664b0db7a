use duckdb::Connection;

use crate::config::{Config, ConfigError, ConfigProvider, TableConfig};
use crate::db::nzem::{
    nodal_demand::NzemNodalDemandArchive,
    nodal_prices::NzemNodalPricesArchive,
    offers::{NzemOffersArchive, OfferTable},
};
use crate::utils::lib_duckdb::{open_with_retry, RetryPolicy};

/// Builds the archives from a snapshot of the configuration.  Create a new one
/// to pick up changes to the configuration file.
pub struct ProdDb {
    pub config: Config,
}

impl ProdDb {
    pub fn new(provider: &impl ConfigProvider) -> Result<ProdDb, ConfigError> {
        Ok(ProdDb {
            config: provider.config()?,
        })
    }

    fn duckdb_path(&self, table: &str) -> Result<String, ConfigError> {
        let (_, db) = self.config.database_for(table)?;
        Ok(db.duckdb_path.clone())
    }

    pub fn table_config(&self, table: &str) -> Result<&TableConfig, ConfigError> {
        let (key, _) = self.config.database_for(table)?;
        self.config.table(key, table)
    }

    pub fn nzem_nodal_prices(&self) -> Result<NzemNodalPricesArchive, ConfigError> {
        Ok(NzemNodalPricesArchive {
            duckdb_path: self.duckdb_path(NzemNodalPricesArchive::TABLE)?,
        })
    }

    pub fn nzem_nodal_demand(&self) -> Result<NzemNodalDemandArchive, ConfigError> {
        Ok(NzemNodalDemandArchive {
            duckdb_path: self.duckdb_path(NzemNodalDemandArchive::TABLE)?,
        })
    }

    pub fn nzem_offers(&self, table: OfferTable) -> Result<NzemOffersArchive, ConfigError> {
        Ok(NzemOffersArchive {
            duckdb_path: self.duckdb_path(table.table_name())?,
            table,
        })
    }

    /// Open the database configured under `database`, waiting for a writer to
    /// let go of the file if needed.
    pub fn connect(
        &self,
        database: &str,
        read_only: bool,
    ) -> Result<Connection, Box<dyn std::error::Error>> {
        let db = self.config.database(database)?;
        Ok(open_with_retry(
            &db.duckdb_path,
            &RetryPolicy::default(),
            read_only,
        )?)
    }
}
