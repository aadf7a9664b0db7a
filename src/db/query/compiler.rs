use std::cmp;
use std::collections::BTreeMap;

use itertools::Itertools;
use jiff::civil::{date, Date};
use log::debug;

use super::predicate::Literal;
use super::selector::{DateSelector, Granularity, ShardKey};
use super::statement::{PartialStatement, SqlText};
use super::QueryError;
use crate::interval::month::Month;

/// Compile a date selector into one statement per shard it touches, in shard
/// (and for month granularity, calendar) order.
///
/// `granularity` only matters for [`DateSelector::DateRange`].
pub fn compile(
    table: &str,
    selector: &DateSelector,
    date_column: &str,
    granularity: Granularity,
) -> Result<Vec<PartialStatement>, QueryError> {
    if table.trim().is_empty() || date_column.trim().is_empty() {
        return Err(QueryError::Validation(
            "table and date column names can't be empty".to_string(),
        ));
    }
    let statements = match selector {
        DateSelector::SingleDate(dt) => {
            let shard = ShardKey::of(*dt);
            let mut text = skeleton(table, shard, date_column);
            text.push_sql(" = ");
            text.push_value(&Literal::Date(*dt));
            vec![PartialStatement::new(shard, text)]
        }
        DateSelector::DateList(dates) => date_list(table, dates, date_column)?,
        DateSelector::DateRange(begin, end) => {
            if begin > end {
                return Err(QueryError::Validation(format!(
                    "begin date {} is after end date {}",
                    begin, end
                )));
            }
            match granularity {
                Granularity::Year => yearly(table, *begin, *end, date_column),
                Granularity::Month => monthly(table, *begin, *end, date_column),
            }
        }
    };
    debug!(
        "compiled {} statement(s) for {} on {}",
        statements.len(),
        table,
        statements.iter().map(|e| e.shard()).join(",")
    );
    Ok(statements)
}

fn skeleton(table: &str, shard: ShardKey, date_column: &str) -> SqlText {
    let mut text = SqlText::default();
    text.push_sql(&format!(
        "SELECT * FROM {} WHERE {}",
        shard.table_name(table),
        date_column
    ));
    text
}

fn between(table: &str, low: Date, high: Date, date_column: &str) -> PartialStatement {
    let shard = ShardKey::of(low);
    let mut text = skeleton(table, shard, date_column);
    text.push_sql(" BETWEEN ");
    text.push_value(&Literal::Date(low));
    text.push_sql(" AND ");
    text.push_value(&Literal::Date(high));
    PartialStatement::new(shard, text)
}

/// One `IN (...)` statement per year, years ascending, dates ascending within a year.
fn date_list(
    table: &str,
    dates: &[Date],
    date_column: &str,
) -> Result<Vec<PartialStatement>, QueryError> {
    if dates.is_empty() {
        return Err(QueryError::Configuration(
            "exactly one date selector required, got an empty list of dates".to_string(),
        ));
    }
    let mut by_year: BTreeMap<ShardKey, Vec<Literal>> = BTreeMap::new();
    for dt in dates.iter().sorted() {
        by_year
            .entry(ShardKey::of(*dt))
            .or_default()
            .push(Literal::Date(*dt));
    }
    Ok(by_year
        .into_iter()
        .map(|(shard, values)| {
            let mut text = skeleton(table, shard, date_column);
            text.push_sql(" IN ");
            text.push_list(&values);
            PartialStatement::new(shard, text)
        })
        .collect())
}

/// Split `[begin, end]` at year boundaries.
fn yearly(table: &str, begin: Date, end: Date, date_column: &str) -> Vec<PartialStatement> {
    (begin.year()..=end.year())
        .map(|year| {
            let low = if year == begin.year() {
                begin
            } else {
                date(year, 1, 1)
            };
            let high = if year == end.year() {
                end
            } else {
                date(year, 12, 31)
            };
            between(table, low, high, date_column)
        })
        .collect()
}

/// Split `[begin, end]` at month boundaries.  Each piece goes to the shard of
/// its first day.
fn monthly(table: &str, begin: Date, end: Date, date_column: &str) -> Vec<PartialStatement> {
    let mut out = Vec::new();
    let mut start = begin;
    loop {
        let month = Month::containing(start);
        let stop = cmp::min(month.end_date(), end);
        out.push(between(table, start, stop, date_column));
        if stop == end {
            break;
        }
        start = month.next().start_date();
    }
    out
}
