use jiff::civil::Date;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammars/date.pest"]
struct DateParser;

#[derive(Error, Debug)]
pub enum DateParseError {
    #[error("failed parsing {0} as a date")]
    Syntax(String),
    #[error("{input} is not a valid calendar date: {source}")]
    Invalid { input: String, source: jiff::Error },
}

/// Parse a date written day-first (`14-12-2013`, `14/12/2013`, `14.12.2013`),
/// ISO (`2013-12-14`) or compact (`20131214`).
pub fn parse_date(input: &str) -> Result<Date, DateParseError> {
    let input = input.trim();
    let mut pairs = DateParser::parse(Rule::date, input)
        .map_err(|_| DateParseError::Syntax(input.to_string()))?;
    let form = pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or_else(|| DateParseError::Syntax(input.to_string()))?;

    let (mut year, mut month, mut day) = (0i16, 0i8, 0i8);
    for part in form.into_inner() {
        match part.as_rule() {
            Rule::year => year = number(&part, input)?,
            Rule::month | Rule::mm => month = number(&part, input)?,
            Rule::day | Rule::dd => day = number(&part, input)?,
            _ => return Err(DateParseError::Syntax(input.to_string())),
        }
    }
    Date::new(year, month, day).map_err(|source| DateParseError::Invalid {
        input: input.to_string(),
        source,
    })
}

fn number<T: std::str::FromStr>(pair: &Pair<Rule>, input: &str) -> Result<T, DateParseError> {
    pair.as_str()
        .parse()
        .map_err(|_| DateParseError::Syntax(input.to_string()))
}

/// Format a date the way the store expects date literals, e.g. `05-01-2014`.
pub fn format_dmy(date: Date) -> String {
    date.strftime("%d-%m-%Y").to_string()
}

/// Parse a comma separated list of dates, e.g. `14-05-2009,31-03-2012`.
pub fn parse_dates(input: &str) -> Result<Vec<Date>, DateParseError> {
    input
        .split(',')
        .filter(|e| !e.trim().is_empty())
        .map(parse_date)
        .collect()
}
