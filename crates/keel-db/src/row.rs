//! The write-value row graph for relationship-aware inserts. Grounded on
//! `original_source/runtime/actions/query.go`'s `Row`/`Relationship`/
//! `generateInsertCte`, and `spec.md` §9 Design Notes ("Row graph for
//! inserts: use a tagged union for cell values... no shared mutable state
//! between rows").
//!
//! Invariant (`spec.md` §3): the graph is a rooted tree - no cycles. Each
//! [`Row`] owns its `references` (rows that must be inserted *before* it,
//! because this row's own columns hold their foreign key) and its
//! `referenced_by` (rows that must be inserted *after* it, because *they*
//! hold the foreign key back to this row).

use crate::to_snake_case;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Literal(JsonValue),
    /// A scalar subquery substituted verbatim into the VALUES list, e.g.
    /// `(SELECT id FROM new_1_customer)`. Never touches `args` - see
    /// `spec.md` §9 "Either field or value or null" operand note, the same
    /// pattern applied to insert cells instead of filter operands.
    InlineSubquery(String),
}

/// One row to insert, keyed by the BTreeMap's natural (field-name)
/// ordering so CTE column lists come out lexicographically sorted without
/// an extra sort step - see `spec.md` §4.F "Column order... is
/// lexicographic over the row's value keys".
#[derive(Debug, Clone)]
pub struct Row {
    pub model_name: String,
    pub values: BTreeMap<String, CellValue>,
    pub references: Vec<Reference>,
    pub referenced_by: Vec<ReferencedBy>,
}

impl Row {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            values: BTreeMap::new(),
            references: Vec::new(),
            referenced_by: Vec::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.values.insert(field.into(), CellValue::Literal(value));
        self
    }

    pub fn with_reference(mut self, foreign_key_field_name: impl Into<String>, row: Row) -> Self {
        self.references.push(Reference { row, foreign_key_field_name: foreign_key_field_name.into() });
        self
    }

    pub fn with_referenced_by(mut self, foreign_key_field_name: impl Into<String>, row: Row) -> Self {
        self.referenced_by.push(ReferencedBy { row, foreign_key_field_name: foreign_key_field_name.into() });
        self
    }
}

/// A row this row depends on: `row` must be inserted first, and this row's
/// `foreign_key_field_name` column is filled with `row`'s generated id.
#[derive(Debug, Clone)]
pub struct Reference {
    pub row: Row,
    pub foreign_key_field_name: String,
}

/// A row that depends on this one: `row` is inserted after, and `row`'s own
/// `foreign_key_field_name` column is filled with this row's generated id.
#[derive(Debug, Clone)]
pub struct ReferencedBy {
    pub row: Row,
    pub foreign_key_field_name: String,
}

/// Renders `row` (and everything it transitively references/is referenced
/// by) as a sequence of CTEs, in the order each must appear so that every
/// `(SELECT id FROM ...)` subquery references an alias already defined
/// earlier in the `WITH` clause. Returns `(ctes, root_alias)`; `args`
/// accumulates positional values in the same left-to-right order the CTEs
/// are emitted, matching the invariant that every `?` in the final
/// template has a corresponding `args` entry.
pub fn render(row: &Row, args: &mut Vec<JsonValue>) -> (Vec<String>, String) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut ctes = Vec::new();
    let alias = render_row(row, &mut counts, &mut ctes, args);
    (ctes, alias)
}

fn render_row(row: &Row, counts: &mut BTreeMap<String, usize>, ctes: &mut Vec<String>, args: &mut Vec<JsonValue>) -> String {
    let mut overrides = BTreeMap::new();
    for reference in &row.references {
        let child_alias = render_row(&reference.row, counts, ctes, args);
        overrides.insert(
            reference.foreign_key_field_name.clone(),
            CellValue::InlineSubquery(format!("(SELECT id FROM {child_alias})")),
        );
    }

    let count = counts.entry(row.model_name.clone()).or_insert(0);
    *count += 1;
    let alias = format!("new_{}_{}", count, to_snake_case(&row.model_name));

    let mut values = row.values.clone();
    values.extend(overrides);
    ctes.push(render_cte(&row.model_name, &alias, &values, args));

    for referenced_by in &row.referenced_by {
        let mut child = referenced_by.row.clone();
        child.values.insert(
            referenced_by.foreign_key_field_name.clone(),
            CellValue::InlineSubquery(format!("(SELECT id FROM {alias})")),
        );
        render_row(&child, counts, ctes, args);
    }

    alias
}

fn render_cte(model_name: &str, alias: &str, values: &BTreeMap<String, CellValue>, args: &mut Vec<JsonValue>) -> String {
    let table = crate::sql_quote(&[&to_snake_case(model_name)]);
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();

    for (field, value) in values {
        columns.push(crate::sql_quote(&[&to_snake_case(field)]));
        match value {
            CellValue::Literal(v) => {
                args.push(v.clone());
                placeholders.push("?".to_string());
            }
            CellValue::InlineSubquery(sql) => placeholders.push(sql.clone()),
        }
    }

    format!(
        "{alias} AS (INSERT INTO {table} ({}) VALUES ({}) RETURNING *)",
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// `spec.md` §8 scenario 4: `Sale` owns `customer` (belongsTo) and
    /// `items` (hasMany of `SaleItem`, which belongsTo `sale`).
    #[test]
    fn nested_insert_orders_ctes_references_then_self_then_referenced_by() {
        let customer = Row::new("Customer").with_value("name", json!("Ada"));
        let item = Row::new("SaleItem").with_value("sku", json!("widget"));
        let sale = Row::new("Sale")
            .with_value("total", json!(42))
            .with_reference("customerId", customer)
            .with_referenced_by("saleId", item);

        let mut args = Vec::new();
        let (ctes, root_alias) = render(&sale, &mut args);

        assert_eq!(root_alias, "new_1_sale");
        assert_eq!(ctes.len(), 3);
        assert!(ctes[0].starts_with("new_1_customer AS"));
        assert!(ctes[1].starts_with("new_1_sale AS"));
        assert!(ctes[1].contains("(SELECT id FROM new_1_customer)"));
        assert!(ctes[2].starts_with("new_1_sale_item AS"));
        assert!(ctes[2].contains("(SELECT id FROM new_1_sale)"));
        assert_eq!(args, vec![json!("Ada"), json!(42), json!("widget")]);
    }

    #[test]
    fn columns_within_a_cte_are_lexicographically_ordered() {
        let row = Row::new("Person").with_value("name", json!("a")).with_value("age", json!(1));
        let mut args = Vec::new();
        let (ctes, _) = render(&row, &mut args);
        let cte = &ctes[0];
        let age_pos = cte.find("age").unwrap();
        let name_pos = cte.find("name").unwrap();
        assert!(age_pos < name_pos);
    }
}
