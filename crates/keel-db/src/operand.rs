//! `QueryOperand` - the "either field or value or null" sum type called out
//! in `spec.md` §9 Design Notes, grounded line-for-line on
//! `original_source/runtime/actions/query.go`'s `QueryOperand`/`Field`/
//! `Value`/`Null` helpers. Modeled as three variants rather than three
//! nullable struct fields so a caller can't construct the nonsensical
//! "both a field and a value" state.

use crate::to_snake_case;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperand {
    Field { table: Option<String>, column: String },
    Value(JsonValue),
    Null,
}

impl QueryOperand {
    pub fn field(column: &str) -> Self {
        QueryOperand::Field { table: None, column: to_snake_case(column) }
    }

    pub fn id_field() -> Self {
        Self::field("id")
    }

    pub fn all_fields() -> Self {
        QueryOperand::Field { table: None, column: "*".to_string() }
    }

    /// A field qualified by an explicit table/alias - used for join
    /// conditions and expression paths with more than one fragment.
    pub fn expression_field(fragments: &[&str], field: &str) -> Self {
        QueryOperand::Field {
            table: Some(to_snake_case(&fragments.join("$"))),
            column: to_snake_case(field),
        }
    }

    pub fn value(value: impl Into<JsonValue>) -> Self {
        QueryOperand::Value(value.into())
    }

    pub fn is_field(&self) -> bool {
        matches!(self, QueryOperand::Field { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, QueryOperand::Value(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryOperand::Null)
    }

    /// Renders this operand as a quoted `"table"."column"` reference,
    /// falling back to the query builder's own table when unqualified.
    pub fn to_column_string(&self, default_table: &str) -> String {
        match self {
            QueryOperand::Field { table, column } => {
                let table = table.as_deref().unwrap_or(default_table);
                if column == "*" {
                    format!("{}.*", crate::sql_quote(&[table]))
                } else {
                    crate::sql_quote(&[table, column])
                }
            }
            other => panic!("operand {other:?} is not a field"),
        }
    }
}

/// Operators a `@where`/`@set` condition can lower to. Mirrors
/// `original_source/runtime/actions/query.go`'s `ActionOperator` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOperator {
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
    OneOf,
    NotOneOf,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Before,
    After,
    OnOrBefore,
    OnOrAfter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unqualified_field_uses_default_table() {
        let op = QueryOperand::field("firstName");
        assert_eq!(op.to_column_string("person"), "\"person\".\"first_name\"");
    }

    #[test]
    fn qualified_field_uses_its_own_table() {
        let op = QueryOperand::expression_field(&["post", "author"], "name");
        assert_eq!(op.to_column_string("post"), "\"post$author\".\"name\"");
    }

    #[test]
    fn star_is_never_quoted() {
        let op = QueryOperand::all_fields();
        assert_eq!(op.to_column_string("person"), "\"person\".*");
    }
}
