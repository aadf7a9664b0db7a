use std::fmt;

use itertools::Itertools;

use super::predicate::{Literal, Predicate};
use super::selector::ShardKey;
use super::QueryError;

/// The SQL text of a statement, kept in two forms in lockstep: the literal form
/// with every value quoted inline, and a template with placeholders plus the
/// values to bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SqlText {
    literal: String,
    template: String,
    params: Vec<Literal>,
}

impl SqlText {
    pub(crate) fn push_sql(&mut self, sql: &str) {
        self.literal.push_str(sql);
        self.template.push_str(sql);
    }

    pub(crate) fn push_value(&mut self, value: &Literal) {
        self.literal.push_str(&format!("'{}'", value));
        self.template.push_str(&value.placeholder());
        self.params.push(value.clone());
    }

    /// Write `('v1','v2',...)`, values in the order given.
    pub(crate) fn push_list(&mut self, values: &[Literal]) {
        self.literal
            .push_str(&format!("('{}')", values.iter().join("','")));
        self.template
            .push_str(&format!("({})", values.iter().map(Literal::placeholder).join(",")));
        self.params.extend(values.iter().cloned());
    }

    pub(crate) fn literal(&self) -> &str {
        &self.literal
    }
}

/// A statement that still accepts predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialStatement {
    shard: ShardKey,
    text: SqlText,
}

impl PartialStatement {
    pub(crate) fn new(shard: ShardKey, text: SqlText) -> PartialStatement {
        PartialStatement { shard, text }
    }

    pub fn shard(&self) -> ShardKey {
        self.shard
    }

    pub fn sql(&self) -> &str {
        self.text.literal()
    }

    /// Append one clause.  On error the statement is left untouched.
    pub fn append_predicate(&mut self, predicate: &Predicate) -> Result<(), QueryError> {
        predicate.validate()?;
        predicate.write(&mut self.text)
    }

    pub fn with_predicate(mut self, predicate: &Predicate) -> Result<Self, QueryError> {
        self.append_predicate(predicate)?;
        Ok(self)
    }

    /// Terminate the statement.  The result can't be modified any more.
    pub fn finalize(mut self) -> Statement {
        self.text.push_sql(";");
        Statement {
            shard: self.shard,
            text: self.text,
        }
    }
}

/// A complete statement, ready to execute against its shard.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    shard: ShardKey,
    text: SqlText,
}

impl Statement {
    pub fn shard(&self) -> ShardKey {
        self.shard
    }

    /// Literal SQL with dates written `DD-MM-YYYY`.
    pub fn sql(&self) -> &str {
        &self.text.literal
    }

    /// Same statement with placeholders, see [`Statement::params`].
    pub fn template(&self) -> &str {
        &self.text.template
    }

    pub fn params(&self) -> &[Literal] {
        &self.text.params
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

pub fn finalize(statements: Vec<PartialStatement>) -> Vec<Statement> {
    statements.into_iter().map(PartialStatement::finalize).collect()
}
