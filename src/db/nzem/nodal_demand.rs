use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;

use duckdb::{types::Value, Connection};
use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::node_meta::{Aggregation, NodeMeta, NodeRow};
use super::{build_statements, connect, membership, PeriodFilter};
use crate::db::query::{Granularity, Predicate, QueryError, SelectorArgs, Statement};
use crate::utils::lib_duckdb::{fetch_all, value_as_date, value_as_decimal};

/// Wind farms connect at these GXPs and show up as negative load.
pub const WIND_NODES: [&str; 6] = [
    "TWC2201", "WDV1101", "WWD1101", "WWD1102", "WWD1103", "TWH0331",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub node: String,
    pub trading_date: Date,
    pub trading_period: u8,
    pub demand: Decimal,
}

impl NodeRow for Row {
    fn node(&self) -> &str {
        &self.node
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludedNodes {
    Wind,
    Nodes(Vec<String>),
}

impl ExcludedNodes {
    pub fn nodes(&self) -> Vec<String> {
        match self {
            ExcludedNodes::Wind => WIND_NODES.iter().map(|e| e.to_string()).collect(),
            ExcludedNodes::Nodes(nodes) => nodes.clone(),
        }
    }
}

impl FromStr for ExcludedNodes {
    type Err = QueryError;

    /// `wind`, or a comma separated list of nodes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("wind") {
            return Ok(ExcludedNodes::Wind);
        }
        let nodes: Vec<String> = s
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if nodes.is_empty() {
            return Err(QueryError::Validation(
                "no nodes to exclude".to_string(),
            ));
        }
        Ok(ExcludedNodes::Nodes(nodes))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodalDemandQuery {
    pub dates: SelectorArgs,
    pub periods: PeriodFilter,
    pub nodes: Option<Vec<String>>,
    pub minimum_demand: Option<Decimal>,
    pub maximum_demand: Option<Decimal>,
    pub excluded: Option<ExcludedNodes>,
    pub range_break: Granularity,
}

#[derive(Debug, Clone)]
pub struct NzemNodalDemandArchive {
    pub duckdb_path: String,
}

impl NzemNodalDemandArchive {
    pub const TABLE: &'static str = "nodal_demand";
    pub const DATE_COLUMN: &'static str = "Trading_date";

    pub fn connect(&self) -> Result<Connection, duckdb::Error> {
        connect(&self.duckdb_path)
    }

    pub fn queries(&self, query: &NodalDemandQuery) -> Result<Vec<Statement>, QueryError> {
        query.periods.validate()?;
        let predicates: Vec<Predicate> = [
            query.periods.predicate("Trading_period"),
            membership("Node", &query.nodes),
            query.minimum_demand.map(|e| Predicate::minimum("Demand", e)),
            query.maximum_demand.map(|e| Predicate::maximum("Demand", e)),
            query
                .excluded
                .as_ref()
                .map(|e| Predicate::exclusion("Node", e.nodes())),
        ]
        .into_iter()
        .flatten()
        .collect();
        build_statements(
            Self::TABLE,
            &query.dates,
            Self::DATE_COLUMN,
            query.range_break,
            &predicates,
        )
    }

    pub fn get_data(
        &self,
        conn: &Connection,
        query: &NodalDemandQuery,
    ) -> Result<Vec<Row>, Box<dyn Error>> {
        let statements = self.queries(query)?;
        let raw = fetch_all(conn, &statements, |row| {
            Ok((
                row.get::<_, String>("Node")?,
                row.get::<_, Value>("Trading_date")?,
                row.get::<_, u8>("Trading_period")?,
                row.get::<_, Value>("Demand")?,
            ))
        })?;
        raw.into_iter()
            .map(|(node, date, trading_period, demand)| -> Result<Row, Box<dyn Error>> {
                let trading_date = value_as_date(&date)
                    .ok_or_else(|| format!("invalid trading date {:?} for node {}", date, node))?;
                let demand = value_as_decimal(&demand)
                    .ok_or_else(|| format!("invalid demand {:?} for node {}", demand, node))?;
                Ok(Row {
                    node,
                    trading_date,
                    trading_period,
                    demand,
                })
            })
            .collect()
    }

    /// Demand combined for each value of a node metadata attribute, e.g. the
    /// total by island.  Nodes without metadata are left out.
    pub fn get_grouped(
        &self,
        conn: &Connection,
        query: &NodalDemandQuery,
        meta: &NodeMeta,
        attribute: &str,
        aggregation: Aggregation,
    ) -> Result<BTreeMap<String, Decimal>, Box<dyn Error>> {
        let rows = self.get_data(conn, query)?;
        meta.aggregate_by(&rows, attribute, |e| e.demand, aggregation)
    }
}
