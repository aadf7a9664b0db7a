use std::error::Error;
use std::fmt;
use std::str::FromStr;

use duckdb::Connection;
use serde::{Deserialize, Serialize};

use super::{build_statements, connect, membership, PeriodFilter};
use crate::db::query::{Granularity, QueryError, SelectorArgs, Statement};
use crate::utils::lib_duckdb::{fetch_frame, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferTable {
    Energy,
    GeneratorReserves,
    IlReserves,
}

impl OfferTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            OfferTable::Energy => "energy_offers",
            OfferTable::GeneratorReserves => "generatorreserves_offers",
            OfferTable::IlReserves => "ilreserves_offers",
        }
    }

    /// Column holding the grid location of an offer.
    pub fn grid_column(&self) -> &'static str {
        match self {
            OfferTable::Energy => "grid_injection_point",
            OfferTable::GeneratorReserves => "grid_point",
            OfferTable::IlReserves => "grid_exit_point",
        }
    }
}

impl fmt::Display for OfferTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

impl FromStr for OfferTable {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "energy_offers" | "energy" => Ok(OfferTable::Energy),
            "generatorreserves_offers" | "generatorreserves" => Ok(OfferTable::GeneratorReserves),
            "ilreserves_offers" | "ilreserves" => Ok(OfferTable::IlReserves),
            _ => Err(QueryError::Configuration(format!(
                "unknown offer table {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferQuery {
    pub dates: SelectorArgs,
    pub periods: PeriodFilter,
    pub companies: Option<Vec<String>>,
    pub stations: Option<Vec<String>>,
    pub grid_points: Option<Vec<String>>,
    pub range_break: Granularity,
}

#[derive(Debug, Clone)]
pub struct NzemOffersArchive {
    pub duckdb_path: String,
    pub table: OfferTable,
}

impl NzemOffersArchive {
    pub const DATE_COLUMN: &'static str = "trading_date";

    pub fn connect(&self) -> Result<Connection, duckdb::Error> {
        connect(&self.duckdb_path)
    }

    pub fn queries(&self, query: &OfferQuery) -> Result<Vec<Statement>, QueryError> {
        query.periods.validate()?;
        let predicates: Vec<_> = [
            query.periods.predicate("trading_period"),
            membership("company", &query.companies),
            membership("station", &query.stations),
            membership(self.table.grid_column(), &query.grid_points),
        ]
        .into_iter()
        .flatten()
        .collect();
        build_statements(
            self.table.table_name(),
            &query.dates,
            Self::DATE_COLUMN,
            query.range_break,
            &predicates,
        )
    }

    /// Offers have many columns that differ between tables, so return them
    /// untyped.
    pub fn get_data(&self, conn: &Connection, query: &OfferQuery) -> Result<Frame, Box<dyn Error>> {
        let statements = self.queries(query)?;
        fetch_frame(conn, &statements)
    }
}
