//! Query builder, write-value row graph and SQL statement generation -
//! component F of `spec.md` §4. Grounded throughout on
//! `original_source/runtime/actions/query.go`, which keeps the builder and
//! its Postgres execution/error-classification in the same package; this
//! crate follows that grouping rather than splitting execution out into
//! `keel-runtime`.

pub mod builder;
pub mod error;
pub mod operand;
pub mod paging;
pub mod row;

pub use builder::{QueryBuilder, Statement};
pub use error::DbError;
pub use operand::{ActionOperator, QueryOperand};
pub use paging::Page;
pub use row::{CellValue, Reference, ReferencedBy, Row};

use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as SqlxRow};

/// Double-quotes and dot-joins identifier fragments, e.g.
/// `sql_quote(&["person", "first_name"])` -> `"person"."first_name"`.
/// Mirrors `original_source/runtime/actions/query.go`'s `sqlQuote`.
pub(crate) fn sql_quote(fragments: &[&str]) -> String {
    fragments.iter().map(|f| format!("\"{f}\"")).collect::<Vec<_>>().join(".")
}

/// Converts a `camelCase`/`PascalCase` identifier to `snake_case`, matching
/// the column/table naming convention `spec.md` §3 assumes throughout.
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn bind_arg<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q JsonValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) if n.is_i64() => query.bind(n.as_i64()),
        JsonValue::Number(n) if n.is_u64() => query.bind(n.as_u64().map(|v| v as i64)),
        JsonValue::Number(n) => query.bind(n.as_f64()),
        JsonValue::String(s) => query.bind(s.as_str()),
        other => query.bind(other.clone()),
    }
}

impl Statement {
    /// Runs the statement and collects every returned row. Used for
    /// `list`/`get` (`spec.md` §4.G) and multi-row inserts.
    ///
    /// Generic over the `sqlx` executor so the same statement can run
    /// directly against the pool (read actions) or against an open
    /// `Transaction` (write actions, per `spec.md` §5 "Transactions") -
    /// `&PgPool` and `&mut Transaction<'_, Postgres>` both implement
    /// `sqlx::Executor`.
    pub async fn execute_to_many<'e, E>(&self, executor: E) -> Result<Vec<PgRow>, DbError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = self.rewrite_placeholders();
        tracing::debug!(sql = %sql, arg_count = self.args.len(), "executing query");
        let mut query = sqlx::query(&sql);
        for arg in &self.args {
            query = bind_arg(query, arg);
        }
        query.fetch_all(executor).await.map_err(error::classify)
    }

    /// Runs the statement expecting at most one row back; more than one
    /// is a `DbError::TooManyRows`, mirroring `original_source`'s
    /// single-row `get`/`update`/`delete` actions (`spec.md` §4.G, §7).
    pub async fn execute_to_single<'e, E>(&self, executor: E) -> Result<Option<PgRow>, DbError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let mut rows = self.execute_to_many(executor).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(DbError::TooManyRows(n)),
        }
    }

    /// Runs the statement for effect only, e.g. a `delete` with no
    /// `RETURNING` clause.
    pub async fn execute<'e, E>(&self, executor: E) -> Result<u64, DbError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = self.rewrite_placeholders();
        tracing::debug!(sql = %sql, arg_count = self.args.len(), "executing statement");
        let mut query = sqlx::query(&sql);
        for arg in &self.args {
            query = bind_arg(query, arg);
        }
        let result = query.execute(executor).await.map_err(error::classify)?;
        Ok(result.rows_affected())
    }
}

/// Converts a fetched row's columns into a `lowerCamelCase`-keyed JSON
/// object, undoing the `snake_case` column naming for API responses -
/// mirrors `original_source/runtime/actions/query.go`'s `toLowerCamelMap`.
pub fn row_to_camel_json(row: &PgRow) -> serde_json::Map<String, JsonValue> {
    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name();
        let camel = to_lower_camel_case(name);
        let value: JsonValue = row.try_get(name).unwrap_or(JsonValue::Null);
        map.insert(camel, value);
    }
    map
}

fn to_lower_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_quote_dot_joins_fragments() {
        assert_eq!(sql_quote(&["person", "first_name"]), "\"person\".\"first_name\"");
    }

    #[test]
    fn snake_case_inserts_underscore_before_internal_uppercase() {
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("SaleItem"), "sale_item");
    }

    #[test]
    fn lower_camel_case_reverses_snake_case() {
        assert_eq!(to_lower_camel_case("first_name"), "firstName");
        assert_eq!(to_lower_camel_case("sale_item"), "saleItem");
    }
}
