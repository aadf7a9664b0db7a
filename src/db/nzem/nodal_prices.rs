use std::collections::BTreeMap;
use std::error::Error;

use duckdb::{types::Value, Connection};
use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::node_meta::{Aggregation, NodeMeta, NodeRow};
use super::{build_statements, connect, membership, PeriodFilter};
use crate::db::query::{Granularity, Predicate, QueryError, SelectorArgs, Statement};
use crate::interval::trading_period::{TradingPeriod, TradingPeriodError};
use crate::utils::lib_duckdb::{fetch_all, value_as_date, value_as_decimal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub node: String,
    pub trading_date: Date,
    pub trading_period: u8,
    pub price: Decimal,
}

impl Row {
    pub fn period(&self) -> Result<TradingPeriod, TradingPeriodError> {
        TradingPeriod::new(self.trading_date, self.trading_period)
    }
}

impl NodeRow for Row {
    fn node(&self) -> &str {
        &self.node
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodalPriceQuery {
    pub dates: SelectorArgs,
    pub periods: PeriodFilter,
    pub nodes: Option<Vec<String>>,
    pub minimum_price: Option<Decimal>,
    pub maximum_price: Option<Decimal>,
    pub range_break: Granularity,
}

#[derive(Debug, Clone)]
pub struct NzemNodalPricesArchive {
    pub duckdb_path: String,
}

impl NzemNodalPricesArchive {
    pub const TABLE: &'static str = "nodal_prices";
    pub const DATE_COLUMN: &'static str = "Trading_date";

    pub fn connect(&self) -> Result<Connection, duckdb::Error> {
        connect(&self.duckdb_path)
    }

    pub fn queries(&self, query: &NodalPriceQuery) -> Result<Vec<Statement>, QueryError> {
        query.periods.validate()?;
        let predicates: Vec<Predicate> = [
            query.periods.predicate("Trading_period"),
            membership("Node", &query.nodes),
            query.minimum_price.map(|e| Predicate::minimum("Price", e)),
            query.maximum_price.map(|e| Predicate::maximum("Price", e)),
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

    /// Rows come back shard after shard, in table order within a shard.
    pub fn get_data(
        &self,
        conn: &Connection,
        query: &NodalPriceQuery,
    ) -> Result<Vec<Row>, Box<dyn Error>> {
        let statements = self.queries(query)?;
        let raw = fetch_all(conn, &statements, |row| {
            Ok((
                row.get::<_, String>("Node")?,
                row.get::<_, Value>("Trading_date")?,
                row.get::<_, u8>("Trading_period")?,
                row.get::<_, Value>("Price")?,
            ))
        })?;
        raw.into_iter()
            .map(|(node, date, trading_period, price)| -> Result<Row, Box<dyn Error>> {
                let trading_date = value_as_date(&date)
                    .ok_or_else(|| format!("invalid trading date {:?} for node {}", date, node))?;
                let price = value_as_decimal(&price)
                    .ok_or_else(|| format!("invalid price {:?} for node {}", price, node))?;
                Ok(Row {
                    node,
                    trading_date,
                    trading_period,
                    price,
                })
            })
            .collect()
    }

    /// Prices with the metadata attributes of their node, in the order of
    /// [`NodeMeta::attributes`].  Nodes without metadata are left out.
    pub fn get_with_meta(
        &self,
        conn: &Connection,
        query: &NodalPriceQuery,
        meta: &NodeMeta,
    ) -> Result<Vec<(Row, Vec<String>)>, Box<dyn Error>> {
        let rows = self.get_data(conn, query)?;
        Ok(meta
            .join(&rows)
            .into_iter()
            .map(|(row, attributes)| (row.clone(), attributes.to_vec()))
            .collect())
    }

    /// Prices combined for each value of a node attribute, e.g. mean by island.
    pub fn get_grouped(
        &self,
        conn: &Connection,
        query: &NodalPriceQuery,
        meta: &NodeMeta,
        attribute: &str,
        aggregation: Aggregation,
    ) -> Result<BTreeMap<String, Decimal>, Box<dyn Error>> {
        let rows = self.get_data(conn, query)?;
        meta.aggregate_by(&rows, attribute, |e| e.price, aggregation)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
use std::error::Error;

    use jiff::civil::date;
    use rust_decimal_macros::dec;

    use super::*;

    fn archive() -> NzemNodalPricesArchive {
        NzemNodalPricesArchive {
            duckdb_path: ":memory:".to_string(),
        }
    }

    fn fixture() -> Result<Connection, Box<dyn Error>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r"
    CREATE TABLE nodal_prices_2013 (Node VARCHAR, Trading_date DATE, Trading_period INTEGER, Price DECIMAL(9,2));
    CREATE TABLE nodal_prices_2014 (Node VARCHAR, Trading_date DATE, Trading_period INTEGER, Price DECIMAL(9,2));
    INSERT INTO nodal_prices_2013 VALUES
        ('OTA2201', '2013-12-14', 1, 81.20),
        ('HAY2201', '2013-12-14', 1, 79.50),
        ('OTA2201', '2013-12-31', 48, 250.00);
    INSERT INTO nodal_prices_2014 VALUES
        ('OTA2201', '2014-01-20', 3, 5.10),
        ('OTA2201', '2014-01-21', 3, 70.00),
        ('BEN2201', '2014-01-20', 3, 60.00);
        ",
        )?;
        Ok(conn)
    }

    #[test]
    fn nodal_price_queries() -> Result<(), Box<dyn Error>> {
        let query = NodalPriceQuery {
            dates: SelectorArgs::list(vec![date(2009, 5, 14), date(2012, 3, 31)]),
            periods: PeriodFilter::periods(vec![1, 2]),
            nodes: Some(vec!["OTA2201".to_string(), "HAY2201".to_string()]),
            minimum_price: Some(dec!(0.01)),
            maximum_price: Some(dec!(1000)),
            ..Default::default()
        };
        let statements = archive().queries(&query)?;
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql(),
            "SELECT * FROM nodal_prices_2009 WHERE Trading_date IN ('14-05-2009') \
             AND Trading_period IN ('1','2') AND Node IN ('OTA2201','HAY2201') \
             AND Price >= '0.01' AND Price <= '1000';"
        );
        assert!(statements[1].sql().starts_with(
            "SELECT * FROM nodal_prices_2012 WHERE Trading_date IN ('31-03-2012')"
        ));
        Ok(())
    }

    #[test]
    fn get_prices() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        let query = NodalPriceQuery {
            dates: SelectorArgs::range(date(2013, 12, 14), date(2014, 1, 20)),
            nodes: Some(vec!["OTA2201".to_string()]),
            minimum_price: Some(dec!(10)),
            ..Default::default()
        };
        let rows = archive().get_data(&conn, &query)?;
        assert_eq!(
            rows,
            vec![
                Row {
                    node: "OTA2201".to_string(),
                    trading_date: date(2013, 12, 14),
                    trading_period: 1,
                    price: dec!(81.20),
                },
                Row {
                    node: "OTA2201".to_string(),
                    trading_date: date(2013, 12, 31),
                    trading_period: 48,
                    price: dec!(250.00),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn prices_with_meta() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        let meta = NodeMeta::from_reader(
            "Node,Island,Region\nOTA2201,NI,Auckland\nBEN2201,SI,Canterbury\n".as_bytes(),
        )?;
        let query = NodalPriceQuery {
            dates: SelectorArgs::range(date(2013, 12, 14), date(2014, 1, 20)),
            ..Default::default()
        };
        let rows = archive().get_with_meta(&conn, &query, &meta)?;
        assert_eq!(
            rows.iter()
                .map(|(row, attributes)| (row.node.as_str(), attributes[0].as_str()))
                .collect::<Vec<_>>(),
            vec![
                ("OTA2201", "NI"),
                ("OTA2201", "NI"),
                ("OTA2201", "NI"),
                ("BEN2201", "SI"),
            ]
        );
        assert_eq!(rows[3].1, vec!["SI", "Canterbury"]);

        let mean = archive().get_grouped(&conn, &query, &meta, "Island", Aggregation::Mean)?;
        assert_eq!(
            mean,
            BTreeMap::from([
                ("NI".to_string(), dec!(112.1)),
                ("SI".to_string(), dec!(60.00)),
            ])
        );
        Ok(())
    }

    #[test]
    fn get_prices_single_day() -> Result<(), Box<dyn Error>> {
        let conn = fixture()?;
        let query = NodalPriceQuery {
            dates: SelectorArgs::single(date(2014, 1, 20)),
            periods: PeriodFilter::range(1, 3),
            ..Default::default()
        };
        let rows = archive().get_data(&conn, &query)?;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.trading_date == date(2014, 1, 20)));
        assert_eq!(rows[0].period()?.tpid(), "2014012003");
        Ok(())
    }
}
