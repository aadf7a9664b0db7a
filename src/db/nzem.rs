//! Query builders for the New Zealand electricity market datasets.
//!
//! All of them lean on [`crate::db::query`] for the shard partitioning and only
//! decide which clauses go after the date restriction.

pub mod nodal_demand;
pub mod nodal_prices;
pub mod node_meta;
pub mod offers;

use duckdb::Connection;

use crate::db::query::{
    compile, finalize, validate_optional_range, Granularity, Predicate, QueryError, SelectorArgs,
    Statement,
};
use crate::interval::trading_period::MAX_PERIOD;
use crate::utils::lib_duckdb::{open_with_retry, RetryPolicy};

/// Optional trading period restriction: a set of periods or an inclusive range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodFilter {
    pub periods: Option<Vec<u8>>,
    pub begin: Option<u8>,
    pub end: Option<u8>,
}

impl PeriodFilter {
    pub fn periods(periods: Vec<u8>) -> PeriodFilter {
        PeriodFilter {
            periods: Some(periods),
            ..Default::default()
        }
    }

    pub fn range(begin: u8, end: u8) -> PeriodFilter {
        PeriodFilter {
            begin: Some(begin),
            end: Some(end),
            ..Default::default()
        }
    }

    fn specific(&self) -> Option<&Vec<u8>> {
        self.periods.as_ref().filter(|e| !e.is_empty())
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        validate_optional_range(self.specific(), self.begin.as_ref(), self.end.as_ref())?;
        let all = self
            .specific()
            .into_iter()
            .flatten()
            .chain(self.begin.iter())
            .chain(self.end.iter());
        for &period in all {
            if !(1..=MAX_PERIOD).contains(&period) {
                return Err(QueryError::Validation(format!(
                    "trading period {} is outside 1..={}",
                    period, MAX_PERIOD
                )));
            }
        }
        Ok(())
    }

    /// `None` when no restriction applies.
    pub fn predicate(&self, column: &str) -> Option<Predicate> {
        if let Some(periods) = self.specific() {
            return Some(Predicate::equality(column, periods.clone()));
        }
        match (self.begin, self.end) {
            (Some(begin), Some(end)) => Some(Predicate::range(column, begin, end)),
            _ => None,
        }
    }
}

/// Turn a list of strings into an equality predicate, skipping empty lists.
pub(crate) fn membership(column: &str, values: &Option<Vec<String>>) -> Option<Predicate> {
    values
        .as_ref()
        .filter(|e| !e.is_empty())
        .map(|e| Predicate::equality(column, e.clone()))
}

/// Read-only connection to an archive file, waiting for a loader to finish.
pub(crate) fn connect(duckdb_path: &str) -> Result<Connection, duckdb::Error> {
    open_with_retry(duckdb_path, &RetryPolicy::default(), true)
}

/// Validate the date arguments, compile one statement per shard and append the
/// same predicates, in order, to each of them.
pub(crate) fn build_statements(
    table: &str,
    dates: &SelectorArgs,
    date_column: &str,
    range_break: Granularity,
    predicates: &[Predicate],
) -> Result<Vec<Statement>, QueryError> {
    dates.validate()?;
    let selector = dates.selector()?;
    let mut statements = compile(table, &selector, date_column, range_break)?;
    for statement in statements.iter_mut() {
        for predicate in predicates {
            statement.append_predicate(predicate)?;
        }
    }
    Ok(finalize(statements))
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn period_filter() -> Result<(), QueryError> {
        assert_eq!(PeriodFilter::default().predicate("Trading_period"), None);
        assert_eq!(
            PeriodFilter::periods(vec![3, 4]).predicate("Trading_period"),
            Some(Predicate::equality("Trading_period", vec![3u8, 4]))
        );
        assert_eq!(
            PeriodFilter::range(1, 10)
                .predicate("trading_period")
                .map(|e| e.clause())
                .transpose()?,
            Some(" AND trading_period BETWEEN '1' AND '10'".to_string())
        );
        // empty set of periods means no restriction
        assert_eq!(PeriodFilter::periods(vec![]).predicate("Trading_period"), None);
        Ok(())
    }

    #[test]
    fn period_filter_validation() {
        assert!(PeriodFilter::default().validate().is_ok());
        assert!(PeriodFilter::range(1, 48).validate().is_ok());
        assert!(PeriodFilter::periods(vec![0]).validate().is_err());
        assert!(PeriodFilter::range(1, 51).validate().is_err());
        let half = PeriodFilter {
            begin: Some(3),
            ..Default::default()
        };
        assert!(matches!(half.validate(), Err(QueryError::Validation(_))));
        let both = PeriodFilter {
            periods: Some(vec![2]),
            begin: Some(3),
            end: Some(5),
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn build_appends_in_order() -> Result<(), QueryError> {
        let statements = build_statements(
            "nodal_prices",
            &SelectorArgs::range(date(2014, 12, 30), date(2015, 1, 2)),
            "Trading_date",
            Granularity::Year,
            &[
                Predicate::range("Trading_period", 1, 2),
                Predicate::equality("Node", "OTA2201"),
            ],
        )?;
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1].sql(),
            "SELECT * FROM nodal_prices_2015 WHERE Trading_date BETWEEN '01-01-2015' AND '02-01-2015' \
             AND Trading_period BETWEEN '1' AND '2' AND Node = 'OTA2201';"
        );
        Ok(())
    }

    #[test]
    fn build_requires_dates() {
        assert!(matches!(
            build_statements(
                "nodal_prices",
                &SelectorArgs::default(),
                "Trading_date",
                Granularity::Year,
                &[]
            ),
            Err(QueryError::Validation(_))
        ));
    }
}
