//! Lowers `keel_ast::Expression` trees (the bodies of `@where`/`@set`/
//! `@permission` attributes, carried unevaluated in `keel_proto::Operation`
//! until now) into `keel_db::QueryBuilder` calls - the bridge `spec.md`
//! §4.G's `applyExplicitFilters`/`isAuthorised` describe in prose.
//!
//! Scope is deliberately narrower than `keel_validate::resolver::Resolver`:
//! validation walks the full AST to check *any* reachable path ahead of
//! time, but the runtime only ever needs to resolve the shapes validation
//! already proved legal - a direct field on the action's own model, one
//! `belongsTo` hop for relationship comparisons, `ctx.identity.*`/`ctx.now`,
//! or a bare input label.

use crate::context::RequestContext;
use crate::error::RuntimeError;
use keel_ast::{Condition, Expression, LiteralValue, Operand, Operator};
use keel_db::{ActionOperator, QueryBuilder, QueryOperand};
use keel_proto::{Model, Schema};
use serde_json::{Map as JsonMap, Value as JsonValue};

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn literal_to_json(value: &LiteralValue) -> JsonValue {
    match value {
        LiteralValue::Text(s) => JsonValue::String(s.clone()),
        LiteralValue::Number(n) => serde_json::json!(n),
        LiteralValue::Boolean(b) => JsonValue::Bool(*b),
        LiteralValue::Null => JsonValue::Null,
        LiteralValue::Array(items) => JsonValue::Array(items.iter().map(literal_to_json).collect()),
    }
}

fn operator_to_action(operator: &Operator) -> Result<ActionOperator, RuntimeError> {
    match operator {
        Operator::Eq => Ok(ActionOperator::Equals),
        Operator::NotEq => Ok(ActionOperator::NotEquals),
        Operator::Lt => Ok(ActionOperator::LessThan),
        Operator::LtEq => Ok(ActionOperator::LessThanEquals),
        Operator::Gt => Ok(ActionOperator::GreaterThan),
        Operator::GtEq => Ok(ActionOperator::GreaterThanEquals),
        Operator::In => Ok(ActionOperator::OneOf),
        Operator::NotIn => Ok(ActionOperator::NotOneOf),
        Operator::Assign => Err(RuntimeError::Internal("`=` is not a valid filter operator".to_string())),
    }
}

/// Resolves one operand of a `@where`/`@permission` condition against the
/// action's own model. `qb` is mutated to register an `INNER JOIN` the
/// first time a one-hop relation path (`post.author.name`) is referenced.
pub fn resolve_operand(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    operand: &Operand,
) -> Result<QueryOperand, RuntimeError> {
    match operand {
        Operand::Literal(lit, _) => Ok(QueryOperand::value(literal_to_json(lit))),
        Operand::Ident(fragments) => {
            let names: Vec<&str> = fragments.iter().map(|f| f.value.as_str()).collect();
            resolve_path(qb, model, schema, inputs, ctx, &names)
        }
    }
}

fn resolve_path(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    names: &[&str],
) -> Result<QueryOperand, RuntimeError> {
    let Some((&first, rest)) = names.split_first() else {
        return Err(RuntimeError::Internal("empty identifier path".to_string()));
    };

    if first == lower_camel(&model.name) {
        return resolve_model_path(qb, model, schema, rest);
    }

    if first == "ctx" {
        return resolve_ctx_path(ctx, rest);
    }

    // A bare identifier that isn't `ctx` or the model's own alias is a
    // reference to a labelled action input - the only other name a
    // validated expression could have resolved.
    let value = inputs.get(first).cloned().unwrap_or(JsonValue::Null);
    Ok(QueryOperand::value(value))
}

/// Resolves a field path relative to `model` (no leading model-alias
/// fragment) - shared by expression lowering (`resolve_path`, which strips
/// the alias first) and the dispatcher's implicit-filter binding, which
/// only ever has the bare `keel_proto::OperationInput::field_path` to work
/// from.
pub(crate) fn resolve_model_path(qb: &mut QueryBuilder, model: &Model, schema: &Schema, rest: &[&str]) -> Result<QueryOperand, RuntimeError> {
    match rest {
        [field] => Ok(QueryOperand::field(field)),
        [relation, field] => {
            let relation_field = model
                .field(relation)
                .ok_or_else(|| RuntimeError::Internal(format!("unknown relation field \"{relation}\" on {}", model.name)))?;
            let related_model = schema
                .model(&relation_field.type_name)
                .ok_or_else(|| RuntimeError::Internal(format!("unknown related model \"{}\"", relation_field.type_name)))?;
            let fk_field = relation_field
                .foreign_key_field_name
                .as_deref()
                .ok_or_else(|| RuntimeError::Internal(format!("\"{relation}\" has no foreign key to join on")))?;

            let model_alias = lower_camel(&model.name);
            let join_field = QueryOperand::expression_field(&[&model_alias, relation], "id");
            qb.inner_join(&related_model.name, &join_field, &QueryOperand::field(fk_field));
            Ok(QueryOperand::expression_field(&[&model_alias, relation], field))
        }
        _ => Err(RuntimeError::Internal("expressions may only reference one relationship hop".to_string())),
    }
}

fn resolve_ctx_path(ctx: &RequestContext, rest: &[&str]) -> Result<QueryOperand, RuntimeError> {
    match rest {
        ["now"] => Ok(QueryOperand::value(JsonValue::String(ctx.now.to_rfc3339()))),
        ["identity"] => match &ctx.identity {
            Some(identity) => Ok(QueryOperand::value(JsonValue::Object(identity.clone()))),
            None => Ok(QueryOperand::Null),
        },
        ["identity", field] => Ok(QueryOperand::value(ctx.identity_field(field))),
        _ => Err(RuntimeError::Internal(format!("unsupported ctx path: ctx.{}", rest.join(".")))),
    }
}

/// Lowers one condition into a single `qb.where_` call.
fn lower_condition(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    condition: &Condition,
) -> Result<(), RuntimeError> {
    let lhs = resolve_operand(qb, model, schema, inputs, ctx, &condition.lhs)?;
    let rhs = resolve_operand(qb, model, schema, inputs, ctx, &condition.rhs)?;
    let operator = operator_to_action(&condition.operator)?;
    qb.where_(&lhs, operator, &rhs).map_err(RuntimeError::from)
}

/// Lowers a full `@where`/`@permission` expression tree (possibly combining
/// several conditions with `and`/`or`) into `qb`'s filter list.
pub fn lower_filter_expression(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    expr: &Expression,
) -> Result<(), RuntimeError> {
    match expr {
        Expression::Condition(c) => lower_condition(qb, model, schema, inputs, ctx, c),
        Expression::And(l, r) => {
            lower_filter_expression(qb, model, schema, inputs, ctx, l)?;
            qb.and();
            lower_filter_expression(qb, model, schema, inputs, ctx, r)
        }
        Expression::Or(l, r) => {
            lower_filter_expression(qb, model, schema, inputs, ctx, l)?;
            qb.or();
            lower_filter_expression(qb, model, schema, inputs, ctx, r)
        }
    }
}

/// Resolves a `@set` assignment's right-hand side to the literal value it
/// should write - `spec.md`'s create/update-action rules guarantee the
/// left-hand side is always a bare `<model>.<field>` path, validated
/// separately by `keel_validate::rules::actions::set_lhs_rule`.
pub fn resolve_set_value(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    condition: &Condition,
) -> Result<JsonValue, RuntimeError> {
    let operand = resolve_operand(qb, model, schema, inputs, ctx, &condition.rhs)?;
    match operand {
        QueryOperand::Value(v) => Ok(v),
        QueryOperand::Null => Ok(JsonValue::Null),
        QueryOperand::Field { .. } => Err(RuntimeError::Internal("`@set` right-hand side must not be a column reference".to_string())),
    }
}

/// The `<field>` name a `@set`'s left-hand side (`<model>.<field>`) writes
/// to.
pub fn set_target_field(condition: &Condition) -> Result<&str, RuntimeError> {
    match condition.lhs.as_ident_path().as_deref() {
        Some([_model, field]) => Ok(field),
        _ => Err(RuntimeError::Internal("`@set` left-hand side must be `<model>.<field>`".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_ast::{Ident, Position};
    use keel_proto::Field;

    fn sample_model() -> Model {
        Model {
            name: "Post".to_string(),
            fields: vec![
                Field {
                    name: "title".to_string(),
                    type_name: "Text".to_string(),
                    optional: false,
                    repeated: false,
                    built_in: false,
                    unique: false,
                    foreign_key_field_name: None,
                    relationship_type: None,
                    default: None,
                },
                Field {
                    name: "published".to_string(),
                    type_name: "Boolean".to_string(),
                    optional: false,
                    repeated: false,
                    built_in: false,
                    unique: false,
                    foreign_key_field_name: None,
                    relationship_type: None,
                    default: None,
                },
            ],
            operations: Vec::new(),
        }
    }

    fn ident_path(names: &[&str]) -> Operand {
        Operand::Ident(names.iter().map(|n| Ident::new(*n, Position::synthetic())).collect())
    }

    #[test]
    fn resolves_direct_field_on_own_model() {
        let model = sample_model();
        let schema = Schema { models: vec![model.clone()], enums: vec![], roles: vec![], env_vars: vec![], secrets: vec![] };
        let mut qb = QueryBuilder::new("Post");
        let operand = resolve_operand(&mut qb, &model, &schema, &JsonMap::new(), &RequestContext::new(), &ident_path(&["post", "published"]))
            .unwrap();
        assert_eq!(operand, QueryOperand::field("published"));
    }

    #[test]
    fn resolves_bare_input_label_to_its_bound_value() {
        let model = sample_model();
        let schema = Schema { models: vec![model.clone()], enums: vec![], roles: vec![], env_vars: vec![], secrets: vec![] };
        let mut inputs = JsonMap::new();
        inputs.insert("flag".to_string(), serde_json::json!(true));
        let mut qb = QueryBuilder::new("Post");
        let operand = resolve_operand(&mut qb, &model, &schema, &inputs, &RequestContext::new(), &ident_path(&["flag"])).unwrap();
        assert_eq!(operand, QueryOperand::value(serde_json::json!(true)));
    }

    #[test]
    fn full_where_expression_lowers_without_a_dangling_operator() {
        let model = sample_model();
        let schema = Schema { models: vec![model.clone()], enums: vec![], roles: vec![], env_vars: vec![], secrets: vec![] };
        let condition = Condition {
            lhs: ident_path(&["post", "published"]),
            operator: Operator::Eq,
            operator_position: Position::synthetic(),
            rhs: Operand::Literal(LiteralValue::Boolean(true), Position::synthetic()),
        };
        let mut qb = QueryBuilder::new("Post");
        lower_filter_expression(&mut qb, &model, &schema, &JsonMap::new(), &RequestContext::new(), &Expression::Condition(condition)).unwrap();
        let stmt = qb.select_statement();
        assert_eq!(stmt.template.matches('?').count(), stmt.args.len());
    }

    #[test]
    fn set_target_field_extracts_the_field_name() {
        let condition = Condition {
            lhs: ident_path(&["post", "title"]),
            operator: Operator::Assign,
            operator_position: Position::synthetic(),
            rhs: Operand::Literal(LiteralValue::Text("hi".to_string()), Position::synthetic()),
        };
        assert_eq!(set_target_field(&condition).unwrap(), "title");
    }
}
