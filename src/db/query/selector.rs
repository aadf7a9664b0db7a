use std::fmt;
use std::str::FromStr;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::QueryError;

/// The calendar year suffix of a physical table, e.g. `2014` in `nodal_prices_2014`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardKey(pub i16);

impl ShardKey {
    pub fn of(date: Date) -> ShardKey {
        ShardKey(date.year())
    }

    pub fn year(&self) -> i16 {
        self.0
    }

    /// Name of the physical table holding this shard of `table`.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}_{}", table, self.0)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelector {
    SingleDate(Date),
    DateList(Vec<Date>),
    /// Inclusive of both ends.
    DateRange(Date, Date),
}

/// How a date range is split into statements.  Only used for [`DateSelector::DateRange`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    Year,
    Month,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Year => write!(f, "Year"),
            Granularity::Month => write!(f, "Month"),
        }
    }
}

impl FromStr for Granularity {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "year" => Ok(Granularity::Year),
            "month" => Ok(Granularity::Month),
            _ => Err(QueryError::Configuration(format!(
                "range breaks for {} have not been implemented, try Year or Month",
                s
            ))),
        }
    }
}

/// Date filter arguments as a caller collects them: any combination may be set,
/// exactly one selector must come out of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorArgs {
    pub date: Option<Date>,
    pub dates: Option<Vec<Date>>,
    pub begin: Option<Date>,
    pub end: Option<Date>,
}

impl SelectorArgs {
    pub fn single(date: Date) -> SelectorArgs {
        SelectorArgs {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn list(dates: Vec<Date>) -> SelectorArgs {
        SelectorArgs {
            dates: Some(dates),
            ..Default::default()
        }
    }

    pub fn range(begin: Date, end: Date) -> SelectorArgs {
        SelectorArgs {
            begin: Some(begin),
            end: Some(end),
            ..Default::default()
        }
    }

    fn dates(&self) -> Option<&Vec<Date>> {
        self.dates.as_ref().filter(|e| !e.is_empty())
    }

    /// Check that either specific dates or a complete range were given, not both.
    pub fn validate(&self) -> Result<(), QueryError> {
        let specific = self.date.is_some() || self.dates().is_some();
        validate_selector_args(
            Some(&()).filter(|_| specific),
            self.begin.as_ref(),
            self.end.as_ref(),
        )
    }

    pub fn selector(&self) -> Result<DateSelector, QueryError> {
        let mut selectors = Vec::new();
        if let Some(date) = self.date {
            selectors.push(DateSelector::SingleDate(date));
        }
        if let Some(dates) = self.dates() {
            selectors.push(DateSelector::DateList(dates.clone()));
        }
        if let (Some(begin), Some(end)) = (self.begin, self.end) {
            selectors.push(DateSelector::DateRange(begin, end));
        }
        if selectors.len() != 1 {
            return Err(QueryError::Configuration(format!(
                "exactly one date selector required, got {}",
                selectors.len()
            )));
        }
        Ok(selectors.remove(0))
    }
}

/// Guard for a required filter: either `specific` or a complete `begin`/`end`
/// pair must be given, never both.
pub fn validate_selector_args<S, B>(
    specific: Option<&S>,
    begin: Option<&B>,
    end: Option<&B>,
) -> Result<(), QueryError> {
    check_pair(begin.is_some(), end.is_some())?;
    let range = begin.is_some() && end.is_some();
    match (specific.is_some(), range) {
        (false, false) => Err(QueryError::Validation(
            "you must pass some form of date filter".to_string(),
        )),
        (true, true) => Err(QueryError::Validation(
            "cannot pass both a range and specific dates".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Guard for an optional filter: nothing at all is fine, but a half supplied
/// range or a range together with `specific` is rejected.
pub fn validate_optional_range<S, B>(
    specific: Option<&S>,
    begin: Option<&B>,
    end: Option<&B>,
) -> Result<(), QueryError> {
    check_pair(begin.is_some(), end.is_some())?;
    if specific.is_some() && begin.is_some() && end.is_some() {
        return Err(QueryError::Validation(
            "cannot pass both a range and specific values".to_string(),
        ));
    }
    Ok(())
}

fn check_pair(begin: bool, end: bool) -> Result<(), QueryError> {
    if begin != end {
        return Err(QueryError::Validation(
            "must pass both begin and end for a range".to_string(),
        ));
    }
    Ok(())
}
