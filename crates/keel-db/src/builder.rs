//! The query builder itself. Grounded line-for-line on
//! `original_source/runtime/actions/query.go`'s `QueryBuilder` type and its
//! `Select`/`Insert`/`Update`/`Delete` statement generators, per `spec.md`
//! §4.F.

use crate::error::DbError;
use crate::operand::{ActionOperator, QueryOperand};
use crate::paging::Page;
use crate::row::{render, Row};
use crate::{sql_quote, to_snake_case};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Join {
    table: String,
    alias: String,
    condition: String,
}

/// The templated SQL statement and its positional arguments, ready for
/// `Statement::execute`. `spec.md` §8 invariant: the number of `?` in
/// `template` always equals `args.len()`.
#[derive(Debug, Clone)]
pub struct Statement {
    pub template: String,
    pub args: Vec<JsonValue>,
}

impl Statement {
    /// Rewrites `?` placeholders to Postgres's `$1, $2, ...` style.
    /// `original_source` hands `?`-templated SQL straight to `lib/pq`,
    /// which rewrites internally; `sqlx` against Postgres needs this done
    /// explicitly before the query is prepared.
    pub fn rewrite_placeholders(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut n = 0usize;
        for c in self.template.chars() {
            if c == '?' {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            } else {
                out.push(c);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub model_name: String,
    table: String,
    select: Vec<String>,
    distinct_on: Vec<String>,
    joins: Vec<Join>,
    filters: Vec<String>,
    order_by: Vec<String>,
    returning: Vec<String>,
    limit: Option<i64>,
    args: Vec<JsonValue>,
    write_values: Row,
}

impl QueryBuilder {
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let table = to_snake_case(&model_name);
        Self {
            write_values: Row::new(model_name.clone()),
            model_name,
            table,
            select: Vec::new(),
            distinct_on: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            returning: Vec::new(),
            limit: None,
            args: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_write_values(&mut self, row: Row) {
        self.write_values = row;
    }

    pub fn append_select(&mut self, operand: &QueryOperand) {
        let column = operand.to_column_string(&self.table);
        if !self.select.contains(&column) {
            self.select.push(column);
        }
    }

    pub fn append_select_clause(&mut self, clause: impl Into<String>) {
        let clause = clause.into();
        if !self.select.contains(&clause) {
            self.select.push(clause);
        }
    }

    pub fn append_distinct_on(&mut self, operand: &QueryOperand) {
        let column = operand.to_column_string(&self.table);
        if !self.distinct_on.contains(&column) {
            self.distinct_on.push(column);
        }
    }

    /// Appends a `WHERE` condition. ANDed to existing filters unless an
    /// explicit `or()` was called first.
    pub fn where_(&mut self, lhs: &QueryOperand, operator: ActionOperator, rhs: &QueryOperand) -> Result<(), DbError> {
        let (template, args) = self.condition_template(lhs, operator, rhs)?;
        self.filters.push(template);
        self.args.extend(args);
        Ok(())
    }

    pub fn and(&mut self) {
        trim_rhs_operators(&mut self.filters);
        if !self.filters.is_empty() {
            self.filters.push("AND".to_string());
        }
    }

    pub fn or(&mut self) {
        trim_rhs_operators(&mut self.filters);
        if !self.filters.is_empty() {
            self.filters.push("OR".to_string());
        }
    }

    pub fn open_parenthesis(&mut self) {
        self.filters.push("(".to_string());
    }

    pub fn close_parenthesis(&mut self) {
        trim_rhs_operators(&mut self.filters);
        self.filters.push(")".to_string());
    }

    pub fn inner_join(&mut self, join_model: &str, join_field: &QueryOperand, model_field: &QueryOperand) {
        let QueryOperand::Field { table: Some(alias), .. } = join_field else {
            panic!("inner_join's join_field must be a table-qualified field");
        };
        let join = Join {
            table: sql_quote(&[&to_snake_case(join_model)]),
            alias: sql_quote(&[alias]),
            condition: format!(
                "{} = {}",
                join_field.to_column_string(&self.table),
                model_field.to_column_string(&self.table)
            ),
        };
        if !self.joins.contains(&join) {
            self.joins.push(join);
        }
    }

    pub fn append_order_by(&mut self, operand: &QueryOperand, direction: &str) {
        let clause = format!("{} {}", operand.to_column_string(&self.table), direction);
        if !self.order_by.contains(&clause) {
            self.order_by.push(clause);
        }
    }

    pub fn limit(&mut self, n: i64) {
        self.limit = Some(n);
    }

    pub fn append_returning(&mut self, operand: &QueryOperand) {
        let column = operand.to_column_string(&self.table);
        if !self.returning.contains(&column) {
            self.returning.push(column);
        }
    }

    /// `spec.md` §4.F `ApplyPaging`: adds the `LEAD`/`hasNext` select
    /// column and a correlated `totalCount` subquery, duplicates the
    /// filter args for that subquery (it re-runs the same filters), ANDs
    /// the cursor condition to any existing filters, and orders by `id`.
    /// `first=0`/`last=0` with no cursor means "no limit" - `spec.md` §9
    /// Open Question, resolved in `DESIGN.md`.
    pub fn apply_paging(&mut self, page: &Page) -> Result<(), DbError> {
        let has_next = format!(
            "CASE WHEN LEAD({0}.id) OVER (ORDER BY {0}.id) IS NOT NULL THEN true ELSE false END AS hasNext",
            sql_quote(&[&self.table])
        );
        self.append_select_clause(has_next);

        self.and();

        if let Some(after) = &page.after {
            self.where_(&QueryOperand::id_field(), ActionOperator::GreaterThan, &QueryOperand::value(after.clone()))?;
        } else if let Some(before) = &page.before {
            self.where_(&QueryOperand::id_field(), ActionOperator::LessThan, &QueryOperand::value(before.clone()))?;
        }

        // Built after the cursor condition above so the correlated subquery's
        // own WHERE - and the args duplicated for it - include that cursor
        // filter too (it re-runs the whole filter set, cursor included).
        let total_count = format!("({}) AS totalCount", self.count_query());
        self.append_select_clause(total_count);
        let duplicated = self.args.clone();
        self.args.extend(duplicated);

        let mut direction = "ASC";
        if page.first != 0 {
            self.limit(page.first);
        } else if page.last != 0 {
            direction = "DESC";
            self.limit(page.last);
        }

        self.append_order_by(&QueryOperand::id_field(), direction);
        Ok(())
    }

    fn count_query(&self) -> String {
        let selection = if !self.distinct_on.is_empty() {
            format!("COUNT(DISTINCT {})", self.distinct_on.join(", "))
        } else {
            "COUNT(*)".to_string()
        };
        let joins = self.render_joins();
        let filters = self.render_filters();
        format!("SELECT {} FROM {} {} {}", selection, sql_quote(&[&self.table]), joins, filters)
            .trim()
            .to_string()
    }

    fn render_joins(&self) -> String {
        self.joins
            .iter()
            .map(|j| format!("INNER JOIN {} AS {} ON {}", j.table, j.alias, j.condition))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn render_filters(&self) -> String {
        let conditions = trimmed(&self.filters);
        if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" "))
        }
    }

    /// Emits `SELECT [DISTINCT ON (...)] cols FROM "t" [JOIN ...] [WHERE
    /// ...] [ORDER BY ...] [LIMIT ?]`.
    pub fn select_statement(&mut self) -> Statement {
        if self.select.is_empty() {
            self.append_select(&QueryOperand::all_fields());
        }

        let distinct_on = if !self.distinct_on.is_empty() {
            format!("DISTINCT ON({})", self.distinct_on.join(", "))
        } else {
            String::new()
        };
        let selection = self.select.join(", ");
        let joins = self.render_joins();
        let filters = self.render_filters();
        let order_by = if !self.order_by.is_empty() {
            format!("ORDER BY {}", self.order_by.join(", "))
        } else {
            String::new()
        };

        let mut args = self.args.clone();
        let limit = if let Some(n) = self.limit {
            args.push(JsonValue::from(n));
            "LIMIT ?".to_string()
        } else {
            String::new()
        };

        let template = format!(
            "SELECT {} {} FROM {} {} {} {} {}",
            distinct_on,
            selection,
            sql_quote(&[&self.table]),
            joins,
            filters,
            order_by,
            limit
        );

        Statement { template: collapse_whitespace(&template), args }
    }

    /// Emits a single `WITH <cte1>, <cte2>, ... SELECT * FROM <root_alias>`
    /// built from the write-value row graph (`spec.md` §4.F, §8 scenario 4).
    pub fn insert_statement(&self) -> Statement {
        let mut args = Vec::new();
        let (ctes, root_alias) = render(&self.write_values, &mut args);
        Statement {
            template: format!("WITH {} SELECT * FROM {}", ctes.join(", "), root_alias),
            args,
        }
    }

    /// Emits `UPDATE "t" SET col = ?, ... [JOIN ...] [WHERE ...]
    /// [RETURNING ...]`, with SET columns sorted lexicographically for
    /// determinism (`spec.md` §4.F).
    pub fn update_statement(&self) -> Statement {
        let mut sets = Vec::new();
        let mut args = Vec::new();

        for (field, value) in &self.write_values.values {
            let crate::row::CellValue::Literal(v) = value else {
                continue;
            };
            sets.push(format!("{} = ?", sql_quote(&[&to_snake_case(field)])));
            args.push(v.clone());
        }

        args.extend(self.args.clone());

        let joins = self.render_joins();
        let filters = self.render_filters();
        let returning = if !self.returning.is_empty() {
            format!("RETURNING {}", self.returning.join(", "))
        } else {
            String::new()
        };

        let template = format!(
            "UPDATE {} SET {} {} {} {}",
            sql_quote(&[&self.table]),
            sets.join(", "),
            joins,
            filters,
            returning
        );

        Statement { template: collapse_whitespace(&template), args }
    }

    /// Emits `DELETE FROM "t" [USING ...] [WHERE ...] [RETURNING ...]`,
    /// promoting join conditions into the `WHERE`/`USING` clause since
    /// `DELETE` has no native `JOIN` (`spec.md` §4.F).
    pub fn delete_statement(&self) -> Statement {
        let mut filters_sql = String::new();
        let mut usings = String::new();

        if !self.joins.is_empty() {
            usings = format!(
                "USING {}",
                self.joins
                    .iter()
                    .map(|j| format!("{} AS {}", j.table, j.alias))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let join_conditions = self.joins.iter().map(|j| j.condition.clone()).collect::<Vec<_>>().join(" AND ");
            filters_sql = join_conditions;
            if !self.filters.is_empty() {
                filters_sql.push_str(" AND ");
            }
        }

        let conditions = trimmed(&self.filters);
        if !conditions.is_empty() {
            filters_sql.push_str(&conditions.join(" "));
        }
        let filters_sql = if filters_sql.is_empty() { String::new() } else { format!("WHERE {filters_sql}") };

        let returning = if !self.returning.is_empty() {
            format!("RETURNING {}", self.returning.join(", "))
        } else {
            String::new()
        };

        let template = format!("DELETE FROM {} {} {} {}", sql_quote(&[&self.table]), usings, filters_sql, returning);

        Statement { template: collapse_whitespace(&template), args: self.args.clone() }
    }

    fn condition_template(
        &self,
        lhs: &QueryOperand,
        operator: ActionOperator,
        rhs: &QueryOperand,
    ) -> Result<(String, Vec<JsonValue>), DbError> {
        let mut args = Vec::new();
        let mut rhs_owned = rhs.clone();

        match operator {
            ActionOperator::StartsWith => rhs_owned = wrap_like(rhs_owned, "", "%"),
            ActionOperator::EndsWith => rhs_owned = wrap_like(rhs_owned, "%", ""),
            ActionOperator::Contains | ActionOperator::NotContains => rhs_owned = wrap_like(rhs_owned, "%", "%"),
            _ => {}
        }

        let lhs_sql = match lhs {
            QueryOperand::Field { .. } => lhs.to_column_string(&self.table),
            QueryOperand::Value(v) => {
                args.push(v.clone());
                "?".to_string()
            }
            QueryOperand::Null => "NULL".to_string(),
        };

        let rhs_sql = match &rhs_owned {
            QueryOperand::Field { .. } => rhs_owned.to_column_string(&self.table),
            QueryOperand::Value(JsonValue::Array(items)) if matches!(operator, ActionOperator::OneOf | ActionOperator::NotOneOf) => {
                let placeholders = items.iter().map(|v| {
                    args.push(v.clone());
                    "?"
                }).collect::<Vec<_>>().join(", ");
                format!("({placeholders})")
            }
            QueryOperand::Value(v) => {
                args.push(v.clone());
                "?".to_string()
            }
            QueryOperand::Null => "NULL".to_string(),
        };

        let template = match operator {
            ActionOperator::Equals => format!("{lhs_sql} IS NOT DISTINCT FROM {rhs_sql}"),
            ActionOperator::NotEquals => format!("{lhs_sql} IS DISTINCT FROM {rhs_sql}"),
            ActionOperator::StartsWith | ActionOperator::EndsWith | ActionOperator::Contains => {
                format!("{lhs_sql} LIKE {rhs_sql}")
            }
            ActionOperator::NotContains => format!("{lhs_sql} NOT LIKE {rhs_sql}"),
            ActionOperator::OneOf => format!("{lhs_sql} IN {rhs_sql}"),
            ActionOperator::NotOneOf => format!("{lhs_sql} NOT IN {rhs_sql}"),
            ActionOperator::LessThan | ActionOperator::Before => format!("{lhs_sql} < {rhs_sql}"),
            ActionOperator::LessThanEquals | ActionOperator::OnOrBefore => format!("{lhs_sql} <= {rhs_sql}"),
            ActionOperator::GreaterThan | ActionOperator::After => format!("{lhs_sql} > {rhs_sql}"),
            ActionOperator::GreaterThanEquals | ActionOperator::OnOrAfter => format!("{lhs_sql} >= {rhs_sql}"),
        };

        Ok((template, args))
    }
}

fn wrap_like(operand: QueryOperand, prefix: &str, suffix: &str) -> QueryOperand {
    match operand {
        QueryOperand::Value(JsonValue::String(s)) => QueryOperand::Value(JsonValue::String(format!("{prefix}{s}{suffix}"))),
        other => other,
    }
}

fn trim_rhs_operators(filters: &mut Vec<String>) {
    while matches!(filters.last().map(String::as_str), Some("AND") | Some("OR")) {
        filters.pop();
    }
}

fn trimmed(filters: &[String]) -> Vec<String> {
    let mut v = filters.to_vec();
    trim_rhs_operators(&mut v);
    v
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_statement_has_matching_placeholder_and_arg_count() {
        let mut qb = QueryBuilder::new("Person");
        qb.where_(&QueryOperand::field("firstName"), ActionOperator::Equals, &QueryOperand::value("Ada")).unwrap();
        qb.limit(10);
        let stmt = qb.select_statement();
        assert_eq!(stmt.template.matches('?').count(), stmt.args.len());
        assert!(stmt.template.starts_with("SELECT"));
        assert!(stmt.template.contains("\"person\""));
    }

    #[test]
    fn filters_never_end_with_dangling_operator() {
        let mut qb = QueryBuilder::new("Person");
        qb.where_(&QueryOperand::field("name"), ActionOperator::Equals, &QueryOperand::value("a")).unwrap();
        qb.and();
        let stmt = qb.select_statement();
        assert!(!stmt.template.trim_end().ends_with("AND"));
        assert!(!stmt.template.trim_end().ends_with("OR"));
    }

    /// `spec.md` §8 scenario 5: `list` with `first=10`, `after="k1"`, no
    /// other filters - exercises the same call path `invoke_list` uses
    /// (`append_select(all_fields)` then `apply_paging`), not a
    /// pre-seeded filter that would mask the cursor condition missing from
    /// the `totalCount` subquery.
    #[test]
    fn paging_duplicates_args_for_total_count_subquery() {
        let mut qb = QueryBuilder::new("Person");
        qb.append_select(&QueryOperand::all_fields());
        let page = Page { first: 10, last: 0, after: Some("k1".to_string()), before: None };
        qb.apply_paging(&page).unwrap();
        let stmt = qb.select_statement();
        assert_eq!(stmt.template.matches('?').count(), stmt.args.len());
        assert_eq!(stmt.args, vec![json!("k1"), json!("k1"), json!(10)]);
        let total_count_start = stmt.template.find("AS totalCount").unwrap();
        assert!(stmt.template[..total_count_start].contains("WHERE"), "totalCount subquery must carry the cursor filter: {}", stmt.template);
    }

    #[test]
    fn equality_lowers_to_null_safe_operator() {
        let mut qb = QueryBuilder::new("Person");
        qb.where_(&QueryOperand::field("name"), ActionOperator::Equals, &QueryOperand::value("Ada")).unwrap();
        let stmt = qb.select_statement();
        assert!(stmt.template.contains("IS NOT DISTINCT FROM"));
    }

    #[test]
    fn placeholder_rewrite_produces_postgres_style() {
        let stmt = Statement { template: "SELECT * FROM t WHERE a = ? AND b = ?".to_string(), args: vec![json!(1), json!(2)] };
        assert_eq!(stmt.rewrite_placeholders(), "SELECT * FROM t WHERE a = $1 AND b = $2");
    }

    #[test]
    fn insert_statement_builds_from_write_values() {
        let mut qb = QueryBuilder::new("Person");
        qb.set_write_values(Row::new("Person").with_value("name", json!("Ada")));
        let stmt = qb.insert_statement();
        assert!(stmt.template.starts_with("WITH new_1_person AS"));
        assert!(stmt.template.ends_with("SELECT * FROM new_1_person"));
        assert_eq!(stmt.args, vec![json!("Ada")]);
    }
}
