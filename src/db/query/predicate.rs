use std::fmt;
use std::str::FromStr;

use duckdb::types::{ToSql, ToSqlOutput, ValueRef};
use jiff::civil::Date;
use rust_decimal::Decimal;

use super::statement::SqlText;
use super::QueryError;
use crate::interval::date::{format_dmy, parse_date};

/// A single value compared against a column.
///
/// In the literal SQL form values are written between single quotes as is:
/// embedded quotes are NOT escaped.  Only build literal SQL from trusted input,
/// or execute the parameterized form (see [`super::Statement::template`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    /// Written as `DD-MM-YYYY` in literal SQL.
    Date(Date),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(v) => write!(f, "{}", v),
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Decimal(v) => write!(f, "{}", v),
            Literal::Date(v) => write!(f, "{}", format_dmy(*v)),
        }
    }
}

impl Literal {
    /// Read a value typed on the command line: an integer, a decimal, a date
    /// in any format [`parse_date`] accepts, or else text.
    pub fn infer(s: &str) -> Literal {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            Literal::Integer(v)
        } else if let Ok(v) = Decimal::from_str(s) {
            Literal::Decimal(v)
        } else if let Ok(v) = parse_date(s) {
            Literal::Date(v)
        } else {
            Literal::Text(s.to_string())
        }
    }

    /// Placeholder in the parameterized form.  Dates bind as ISO text and are
    /// cast on the database side, DuckDB doesn't read day-first literals.
    /// Decimals bind as their exact text and are cast with their own scale.
    pub fn placeholder(&self) -> String {
        match self {
            Literal::Date(_) => "CAST(? AS DATE)".to_string(),
            Literal::Decimal(v) => format!("CAST(? AS DECIMAL(38, {}))", v.scale()),
            _ => "?".to_string(),
        }
    }
}

impl ToSql for Literal {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Literal::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Literal::Integer(v) => ToSqlOutput::Owned(duckdb::types::Value::BigInt(*v)),
            Literal::Float(v) => ToSqlOutput::Owned(duckdb::types::Value::Double(*v)),
            Literal::Decimal(v) => ToSqlOutput::Owned(duckdb::types::Value::Text(v.to_string())),
            Literal::Date(v) => ToSqlOutput::Owned(duckdb::types::Value::Text(v.to_string())),
        })
    }
}

macro_rules! literal_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Literal {
                fn from(v: $t) -> Self {
                    Literal::$variant(v.into())
                }
            }
        )*
    };
}

literal_from!(
    &str => Text,
    String => Text,
    &String => Text,
    i64 => Integer,
    i32 => Integer,
    u32 => Integer,
    u8 => Integer,
    f64 => Float,
    Decimal => Decimal,
    Date => Date,
);

/// A predicate value, either a single literal or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Literal),
    Collection(Vec<Literal>),
}

impl Value {
    pub fn scalar(value: impl Into<Literal>) -> Value {
        Value::Scalar(value.into())
    }

    pub fn collection<I, T>(values: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Literal>,
    {
        Value::Collection(values.into_iter().map(Into::into).collect())
    }
}

macro_rules! value_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Scalar(v.into())
                }
            }

            impl From<Vec<$t>> for Value {
                fn from(v: Vec<$t>) -> Self {
                    Value::collection(v)
                }
            }

            impl From<&[$t]> for Value {
                fn from(v: &[$t]) -> Self {
                    Value::collection(v.iter().cloned())
                }
            }
        )*
    };
}

value_from!(&str, String, i64, i32, u32, u8, f64, Decimal, Date);

impl From<Literal> for Value {
    fn from(v: Literal) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<Literal>> for Value {
    fn from(v: Vec<Literal>) -> Self {
        Value::Collection(v)
    }
}

/// A clause appended after the date restriction of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equality { column: String, value: Value },
    Exclusion { column: String, value: Value },
    Range { column: String, low: Literal, high: Literal },
    Minimum { column: String, low: Literal },
    Maximum { column: String, high: Literal },
}

impl Predicate {
    pub fn equality(column: &str, value: impl Into<Value>) -> Predicate {
        Predicate::Equality {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn exclusion(column: &str, value: impl Into<Value>) -> Predicate {
        Predicate::Exclusion {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn range(column: &str, low: impl Into<Literal>, high: impl Into<Literal>) -> Predicate {
        Predicate::Range {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn minimum(column: &str, low: impl Into<Literal>) -> Predicate {
        Predicate::Minimum {
            column: column.to_string(),
            low: low.into(),
        }
    }

    pub fn maximum(column: &str, high: impl Into<Literal>) -> Predicate {
        Predicate::Maximum {
            column: column.to_string(),
            high: high.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Equality { column, .. }
            | Predicate::Exclusion { column, .. }
            | Predicate::Range { column, .. }
            | Predicate::Minimum { column, .. }
            | Predicate::Maximum { column, .. } => column,
        }
    }

    /// The clause in literal form, e.g. ` AND Node IN ('OTA2201','HAY2201')`.
    pub fn clause(&self) -> Result<String, QueryError> {
        let mut text = SqlText::default();
        self.write(&mut text)?;
        Ok(text.literal().to_string())
    }

    pub(crate) fn validate(&self) -> Result<(), QueryError> {
        match self {
            Predicate::Equality {
                column,
                value: Value::Collection(values),
            }
            | Predicate::Exclusion {
                column,
                value: Value::Collection(values),
            } if values.is_empty() => Err(QueryError::Validation(format!(
                "empty list of values for column {}",
                column
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn write(&self, text: &mut SqlText) -> Result<(), QueryError> {
        self.validate()?;
        match self {
            Predicate::Equality { column, value } => {
                write_membership(text, column, value, ("=", "IN"));
            }
            Predicate::Exclusion { column, value } => {
                write_membership(text, column, value, ("!=", "NOT IN"));
            }
            Predicate::Range { column, low, high } => {
                text.push_sql(&format!(" AND {} BETWEEN ", column));
                text.push_value(low);
                text.push_sql(" AND ");
                text.push_value(high);
            }
            Predicate::Minimum { column, low } => {
                text.push_sql(&format!(" AND {} >= ", column));
                text.push_value(low);
            }
            Predicate::Maximum { column, high } => {
                text.push_sql(&format!(" AND {} <= ", column));
                text.push_value(high);
            }
        }
        Ok(())
    }
}

fn write_membership(text: &mut SqlText, column: &str, value: &Value, ops: (&str, &str)) {
    match value {
        Value::Scalar(v) => {
            text.push_sql(&format!(" AND {} {} ", column, ops.0));
            text.push_value(v);
        }
        Value::Collection(vs) => {
            text.push_sql(&format!(" AND {} {} ", column, ops.1));
            text.push_list(vs);
        }
    }
}
