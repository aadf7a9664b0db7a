//! Build SQL against tables that are sharded by calendar year.
//!
//! A logical table `nodal_prices` is stored as `nodal_prices_2013`,
//! `nodal_prices_2014`, ...  A query over a date selector is compiled into one
//! statement per shard it touches, predicates are appended to every statement,
//! and each statement is finalized before being handed to an executor.
//!
//! ```
//! use jiff::civil::date;
//! use lode::db::query::{compile, finalize, DateSelector, Granularity, Predicate};
//!
//! let selector = DateSelector::DateRange(date(2013, 12, 14), date(2014, 1, 20));
//! let mut statements = compile("nodal_prices", &selector, "Trading_date", Granularity::Year)?;
//! for statement in statements.iter_mut() {
//!     statement.append_predicate(&Predicate::equality("Node", "OTA2201"))?;
//! }
//! let queries = finalize(statements);
//! assert_eq!(queries.len(), 2);
//! assert_eq!(
//!     queries[1].sql(),
//!     "SELECT * FROM nodal_prices_2014 WHERE Trading_date BETWEEN '01-01-2014' AND '20-01-2014' AND Node = 'OTA2201';"
//! );
//! # Ok::<(), lode::db::query::QueryError>(())
//! ```

pub mod compiler;
pub mod predicate;
pub mod selector;
pub mod statement;

use thiserror::Error;

pub use compiler::compile;
pub use predicate::{Literal, Predicate, Value};
pub use selector::{
    validate_optional_range, validate_selector_args, DateSelector, Granularity, SelectorArgs,
    ShardKey,
};
pub use statement::{finalize, PartialStatement, Statement};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Malformed or contradictory arguments, e.g. a date range missing its end.
    #[error("invalid query arguments: {0}")]
    Validation(String),
    /// A request the compiler can't turn into SQL, e.g. an unknown granularity.
    #[error("unsupported query configuration: {0}")]
    Configuration(String),
}
