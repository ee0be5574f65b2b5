//! The action dispatcher - component G of `spec.md` §4, §4.G, §5. Given an
//! operation name, a bound-input map and a [`RequestContext`], resolves the
//! owning model/operation from the proto schema, builds and runs the
//! statement (or delegates to a [`Transport`] for `CUSTOM` actions), and
//! returns a normalized [`ActionResult`]. Grounded on
//! `original_source/runtime/actions/{get,list,create,update,delete}.go` and
//! `runtime/actions/query.go`'s `QueryBuilder`-driven execution.

use crate::context::RequestContext;
use crate::error::RuntimeError;
use crate::expr;
use crate::ksuid;
use crate::result::{self, ActionResult};
use crate::transport::{ActionRequest, Transport};
use keel_db::{row_to_camel_json, ActionOperator, DbError, Page, QueryBuilder, QueryOperand, Row};
use keel_proto::{DefaultValue, Implementation, Model, Operation, OperationType, Schema};
use serde_json::{Map as JsonMap, Value as JsonValue};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Binds the action's declared `inputs` (identifier-filter bindings for
/// get/list/update/delete; direct field assignments for create) to a
/// labelled value: the attribute's own `label`, falling back to the last
/// segment of its `field_path` when unlabelled, mirroring
/// `original_source`'s default-to-final-fragment input naming.
fn input_key(input: &keel_proto::OperationInput) -> String {
    input.label.clone().unwrap_or_else(|| input.field_path.last().cloned().unwrap_or_default())
}

/// `spec.md` §4.G step 1: binds named inputs matching model field paths to
/// equality `@where` conditions. Every call after the first ANDs onto the
/// existing filter list via `any_filter`, shared across implicit filters,
/// explicit filters and authorization so the three stay one connected
/// `WHERE` clause rather than three independent ones.
fn apply_implicit_filters(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    operation: &Operation,
    inputs: &JsonMap<String, JsonValue>,
    any_filter: &mut bool,
) -> Result<(), RuntimeError> {
    for input in &operation.inputs {
        let key = input_key(input);
        let value = match inputs.get(&key) {
            Some(v) => v.clone(),
            None if input.optional => continue,
            None => return Err(RuntimeError::InvalidInput(format!("missing required input \"{key}\""))),
        };

        let path: Vec<&str> = input.field_path.iter().map(String::as_str).collect();
        let operand = expr::resolve_model_path(qb, model, schema, &path)?;
        let operator = if value.is_array() { ActionOperator::OneOf } else { ActionOperator::Equals };

        if *any_filter {
            qb.and();
        }
        qb.where_(&operand, operator, &QueryOperand::value(value))?;
        *any_filter = true;
    }
    Ok(())
}

/// `spec.md` §4.G step 2: compiles each `@where` expression to SQL. Distinct
/// `@where` attributes are independent clauses, ANDed together.
fn apply_explicit_filters(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    operation: &Operation,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    any_filter: &mut bool,
) -> Result<(), RuntimeError> {
    for where_expr in &operation.where_exprs {
        if *any_filter {
            qb.and();
        }
        expr::lower_filter_expression(qb, model, schema, inputs, ctx, where_expr)?;
        *any_filter = true;
    }
    Ok(())
}

/// A role-based `@permission(role: X)` rule grants access outright if the
/// caller's identity falls in the role's declared domains/emails -
/// evaluated directly against `ctx.identity`, never pushed into SQL.
fn identity_has_role(schema: &Schema, role_name: &str, ctx: &RequestContext) -> bool {
    let Some(role) = schema.role(role_name) else {
        return false;
    };
    let Some(email) = ctx.identity.as_ref().and_then(|i| i.get("email")).and_then(JsonValue::as_str) else {
        return false;
    };
    if role.emails.iter().any(|e| e == email) {
        return true;
    }
    email.split('@').nth(1).is_some_and(|domain| role.domains.iter().any(|d| d == domain))
}

/// `spec.md` §4.G step 3. A matching role-based rule grants unconditional
/// access. Otherwise, every expression-based `@permission` rule is ORed
/// together and ANDed onto the filter list - a row is only returned if it
/// satisfies at least one of them, so denial reads as "not found" rather
/// than leaking whether a row exists to an unauthorized caller. With no
/// rule of either kind present, there is nothing that can grant access, so
/// the action is denied before ever touching the database.
fn apply_authorization(
    qb: &mut QueryBuilder,
    model: &Model,
    schema: &Schema,
    operation: &Operation,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
    any_filter: &mut bool,
) -> Result<(), RuntimeError> {
    if operation.permissions.is_empty() {
        return Ok(());
    }

    let mut expressions = Vec::new();
    for rule in &operation.permissions {
        match rule {
            keel_proto::PermissionRule::Role(name) => {
                if identity_has_role(schema, name, ctx) {
                    return Ok(());
                }
            }
            keel_proto::PermissionRule::Expression(expr) => expressions.push(expr),
        }
    }

    if expressions.is_empty() {
        return Err(RuntimeError::NotAuthorized);
    }

    if *any_filter {
        qb.and();
    }
    qb.open_parenthesis();
    for (i, expr) in expressions.iter().enumerate() {
        if i > 0 {
            qb.or();
        }
        expr::lower_filter_expression(qb, model, schema, inputs, ctx, expr)?;
    }
    qb.close_parenthesis();
    *any_filter = true;
    Ok(())
}

/// Create actions can't push an expression-based permission rule into an
/// `INSERT` the way read/update/delete push one into a `WHERE` clause -
/// there is no existing row to filter. Only role-based rules are
/// enforceable before the row exists; an expression-only `@permission` on a
/// create action is therefore treated as always-denied, matching the "no
/// rule grants access" fallback in `spec.md` §4.G step 3.
fn authorize_create(schema: &Schema, operation: &Operation, ctx: &RequestContext) -> Result<(), RuntimeError> {
    if operation.permissions.is_empty() {
        return Ok(());
    }
    let granted = operation.permissions.iter().any(|rule| match rule {
        keel_proto::PermissionRule::Role(name) => identity_has_role(schema, name, ctx),
        keel_proto::PermissionRule::Expression(_) => false,
    });
    if granted {
        Ok(())
    } else {
        Err(RuntimeError::NotAuthorized)
    }
}

fn parse_page(inputs: &JsonMap<String, JsonValue>) -> Page {
    Page {
        first: inputs.get("first").and_then(JsonValue::as_i64).unwrap_or(0),
        last: inputs.get("last").and_then(JsonValue::as_i64).unwrap_or(0),
        after: inputs.get("after").and_then(JsonValue::as_str).map(str::to_string),
        before: inputs.get("before").and_then(JsonValue::as_str).map(str::to_string),
    }
}

/// Builds the write-value row graph for a create action: runtime-generated
/// defaults (`id` KSUID, `createdAt`/`updatedAt` timestamps), then declared
/// `@default("literal")` values, then bound inputs (direct fields, or one
/// level of nested-relation fields via a two-segment `field_path`), then
/// `@set` overrides applied last so they always win - `spec.md` §4.F, §9
/// scenario 4 (nested relation inserts).
fn build_create_row(
    schema: &Schema,
    model: &Model,
    operation: &Operation,
    inputs: &JsonMap<String, JsonValue>,
    ctx: &RequestContext,
) -> Result<Row, RuntimeError> {
    let mut row = Row::new(model.name.clone());

    for field in &model.fields {
        if field.is_relation() {
            continue;
        }
        match &field.default {
            Some(DefaultValue::Generated) if field.name == "id" => {
                row = row.with_value("id", JsonValue::String(ksuid::generate()));
            }
            Some(DefaultValue::Generated) => {
                row = row.with_value(field.name.clone(), JsonValue::String(ctx.now.to_rfc3339()));
            }
            Some(DefaultValue::Literal(value)) => {
                row = row.with_value(field.name.clone(), value.clone());
            }
            None if field.name == "createdAt" || field.name == "updatedAt" => {
                row = row.with_value(field.name.clone(), JsonValue::String(ctx.now.to_rfc3339()));
            }
            None => {}
        }
    }

    let mut nested_values: HashMap<String, Vec<(String, JsonValue)>> = HashMap::new();

    for input in operation.inputs.iter().chain(operation.with_inputs.iter()) {
        let key = input_key(input);
        let value = match inputs.get(&key) {
            Some(v) => v.clone(),
            None if input.optional => continue,
            None => return Err(RuntimeError::InvalidInput(format!("missing required input \"{key}\""))),
        };

        match input.field_path.as_slice() {
            [field] => row = row.with_value(field.clone(), value),
            [relation, field] => nested_values.entry(relation.clone()).or_default().push((field.clone(), value)),
            _ => return Err(RuntimeError::Internal("create inputs may only nest one relationship deep".to_string())),
        }
    }

    for (relation, values) in nested_values {
        let relation_field = model
            .field(&relation)
            .ok_or_else(|| RuntimeError::Internal(format!("unknown relation \"{relation}\" in create inputs")))?;
        let related_model = schema
            .model(&relation_field.type_name)
            .ok_or_else(|| RuntimeError::Internal(format!("unknown related model \"{}\"", relation_field.type_name)))?;

        let mut nested_row = Row::new(related_model.name.clone());
        for (field, value) in values {
            nested_row = nested_row.with_value(field, value);
        }

        match relation_field.relationship_type {
            Some(keel_proto::RelationshipType::BelongsTo) => {
                let fk = relation_field
                    .foreign_key_field_name
                    .clone()
                    .ok_or_else(|| RuntimeError::Internal(format!("\"{relation}\" has no foreign key field")))?;
                row = row.with_reference(fk, nested_row);
            }
            Some(keel_proto::RelationshipType::HasMany) => {
                let back_ref = related_model
                    .belongs_to(&model.name)
                    .ok_or_else(|| RuntimeError::Internal(format!("\"{}\" has no belongsTo field back to \"{}\"", related_model.name, model.name)))?;
                let fk = back_ref
                    .foreign_key_field_name
                    .clone()
                    .ok_or_else(|| RuntimeError::Internal(format!("\"{}\" has no foreign key field", back_ref.name)))?;
                row = row.with_referenced_by(fk, nested_row);
            }
            None => return Err(RuntimeError::Internal(format!("\"{relation}\" is not a relationship field"))),
        }
    }

    for set_expr in &operation.set_exprs {
        let keel_ast::Expression::Condition(condition) = set_expr else {
            return Err(RuntimeError::Internal("`@set` must be a single assignment condition".to_string()));
        };
        let field = expr::set_target_field(condition)?.to_string();
        let mut scratch = QueryBuilder::new(model.name.clone());
        let value = expr::resolve_set_value(&mut scratch, model, schema, inputs, ctx, condition)?;
        row = row.with_value(field, value);
    }

    Ok(row)
}

/// Builds the `SET` values for an update action: bound inputs first, then
/// `@set` overrides, then an unconditional `updatedAt` bump - `spec.md`
/// §4.G "Returns updated row with `updatedAt` bumped".
fn build_update_row(schema: &Schema, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<Row, RuntimeError> {
    let mut row = Row::new(model.name.clone());
    let filter_keys: HashSet<&str> = operation.inputs.iter().map(|i| i.field_path.last().map(String::as_str).unwrap_or("")).collect();

    for input in &operation.with_inputs {
        let key = input_key(input);
        let value = match inputs.get(&key) {
            Some(v) => v.clone(),
            None if input.optional => continue,
            None => return Err(RuntimeError::InvalidInput(format!("missing required input \"{key}\""))),
        };
        if let [field] = input.field_path.as_slice() {
            if !filter_keys.contains(field.as_str()) {
                row = row.with_value(field.clone(), value);
            }
        }
    }

    for set_expr in &operation.set_exprs {
        let keel_ast::Expression::Condition(condition) = set_expr else {
            return Err(RuntimeError::Internal("`@set` must be a single assignment condition".to_string()));
        };
        let field = expr::set_target_field(condition)?.to_string();
        let mut scratch = QueryBuilder::new(model.name.clone());
        let value = expr::resolve_set_value(&mut scratch, model, schema, inputs, ctx, condition)?;
        row = row.with_value(field, value);
    }

    if model.field("updatedAt").is_some() {
        row = row.with_value("updatedAt", JsonValue::String(ctx.now.to_rfc3339()));
    }

    Ok(row)
}

/// Orchestrates action invocation against a live schema and database pool.
/// One dispatcher instance serves the whole schema; `transports` maps
/// custom-function operation names to the capability that executes them
/// (`spec.md` §6, §9 Design Notes).
pub struct Dispatcher {
    pool: PgPool,
    schema: Schema,
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl Dispatcher {
    pub fn new(pool: PgPool, schema: Schema) -> Self {
        Self { pool, schema, transports: HashMap::new() }
    }

    pub fn with_transport(mut self, operation_name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(operation_name.into(), transport);
        self
    }

    fn find_operation(&self, operation_name: &str) -> Result<(&Model, &Operation), RuntimeError> {
        self.schema
            .models
            .iter()
            .find_map(|model| model.operation(operation_name).map(|op| (model, op)))
            .ok_or_else(|| RuntimeError::Internal(format!("no operation named \"{operation_name}\"")))
    }

    /// Runs one action invocation to completion, or times out at `deadline`
    /// - `spec.md` §5 "Cancellation/timeouts". A deadline hit drops any
    /// open transaction future, which rolls it back via `Drop`.
    pub async fn invoke(
        &self,
        operation_name: &str,
        inputs: JsonMap<String, JsonValue>,
        ctx: RequestContext,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<ActionResult, RuntimeError> {
        let body = self.invoke_inner(operation_name, inputs, ctx);
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, body)
                .await
                .map_err(|_| RuntimeError::Internal("action deadline exceeded".to_string()))?,
            None => body.await,
        }
    }

    async fn invoke_inner(&self, operation_name: &str, inputs: JsonMap<String, JsonValue>, ctx: RequestContext) -> Result<ActionResult, RuntimeError> {
        let (model, operation) = self.find_operation(operation_name)?;

        if operation.implementation == Implementation::Custom {
            return self.invoke_custom(operation, inputs, &ctx).await;
        }

        match operation.op_type {
            OperationType::Get => self.invoke_get(model, operation, &inputs, &ctx).await,
            OperationType::List => self.invoke_list(model, operation, &inputs, &ctx).await,
            OperationType::Create => self.invoke_create(model, operation, &inputs, &ctx).await,
            OperationType::Update => self.invoke_update(model, operation, &inputs, &ctx).await,
            OperationType::Delete => self.invoke_delete(model, operation, &inputs, &ctx).await,
            OperationType::Read | OperationType::Write => self.invoke_custom(operation, inputs, &ctx).await,
        }
    }

    async fn invoke_custom(&self, operation: &Operation, inputs: JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        let transport = self
            .transports
            .get(&operation.name)
            .ok_or_else(|| RuntimeError::Internal(format!("no transport registered for custom action \"{}\"", operation.name)))?;

        let request = ActionRequest::new(operation.name.clone(), JsonValue::Object(inputs), ctx);
        let response = transport.call(request).await?;

        if let Some(error) = response.error {
            return Err(RuntimeError::Internal(format!("{}: {}", error.code, error.message)));
        }
        Ok(ActionResult::Custom(response.result))
    }

    fn build_read_query(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<QueryBuilder, RuntimeError> {
        let mut qb = QueryBuilder::new(model.name.clone());
        let mut any_filter = false;
        apply_implicit_filters(&mut qb, model, &self.schema, operation, inputs, &mut any_filter)?;
        apply_explicit_filters(&mut qb, model, &self.schema, operation, inputs, ctx, &mut any_filter)?;
        apply_authorization(&mut qb, model, &self.schema, operation, inputs, ctx, &mut any_filter)?;
        Ok(qb)
    }

    async fn invoke_get(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        let mut qb = self.build_read_query(model, operation, inputs, ctx)?;
        qb.append_distinct_on(&QueryOperand::id_field());
        let stmt = qb.select_statement();

        let row = match stmt.execute_to_single(&self.pool).await {
            Ok(row) => row,
            Err(DbError::TooManyRows(n)) => {
                tracing::error!(operation = %operation.name, rows = n, "get action invariant violated: multiple rows matched a unique filter");
                return Err(RuntimeError::Internal(format!("{n} rows returned for a single-row get")));
            }
            Err(err) => return Err(err.into()),
        };

        match row {
            Some(row) => Ok(ActionResult::Row(row_to_camel_json(&row))),
            None => Err(RuntimeError::NotFound),
        }
    }

    async fn invoke_list(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        let mut qb = self.build_read_query(model, operation, inputs, ctx)?;
        qb.append_select(&QueryOperand::all_fields());
        qb.apply_paging(&parse_page(inputs))?;
        let stmt = qb.select_statement();

        let rows = stmt.execute_to_many(&self.pool).await?;
        let mut maps: Vec<_> = rows.iter().map(row_to_camel_json).collect();
        let page_info = result::extract_page_info(&mut maps);
        Ok(ActionResult::List { results: maps, page_info })
    }

    async fn invoke_create(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        authorize_create(&self.schema, operation, ctx)?;
        let row = build_create_row(&self.schema, model, operation, inputs, ctx)?;

        let mut qb = QueryBuilder::new(model.name.clone());
        qb.set_write_values(row);
        let stmt = qb.insert_statement();

        let mut tx = self.pool.begin().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
        let created = match stmt.execute_to_single(&mut tx).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(RuntimeError::Internal("insert returned no row".to_string()));
            }
            Err(err) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(err.into());
            }
        };
        tx.commit().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;

        Ok(ActionResult::Row(row_to_camel_json(&created)))
    }

    async fn invoke_update(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        let mut qb = self.build_read_query(model, operation, inputs, ctx)?;
        let row = build_update_row(&self.schema, model, operation, inputs, ctx)?;
        qb.set_write_values(row);
        qb.append_returning(&QueryOperand::all_fields());
        let stmt = qb.update_statement();

        let mut tx = self.pool.begin().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
        let updated = match stmt.execute_to_single(&mut tx).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(RuntimeError::NotFound);
            }
            Err(err) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(err.into());
            }
        };
        tx.commit().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;

        Ok(ActionResult::Row(row_to_camel_json(&updated)))
    }

    async fn invoke_delete(&self, model: &Model, operation: &Operation, inputs: &JsonMap<String, JsonValue>, ctx: &RequestContext) -> Result<ActionResult, RuntimeError> {
        let mut qb = self.build_read_query(model, operation, inputs, ctx)?;
        qb.append_returning(&QueryOperand::id_field());
        let stmt = qb.delete_statement();

        let mut tx = self.pool.begin().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
        let deleted = match stmt.execute_to_single(&mut tx).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(RuntimeError::NotFound);
            }
            Err(err) => {
                tx.rollback().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;
                return Err(err.into());
            }
        };
        tx.commit().await.map_err(DbError::Sqlx).map_err(RuntimeError::from)?;

        let id = row_to_camel_json(&deleted)
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::Internal("delete did not return an id".to_string()))?;
        Ok(ActionResult::Deleted { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_proto::{Field, OperationInput, RelationshipType, Role};

    fn person_schema() -> Schema {
        let model = Model {
            name: "Person".to_string(),
            fields: vec![
                Field { name: "id".to_string(), type_name: "ID".to_string(), optional: false, repeated: false, built_in: true, unique: true, foreign_key_field_name: None, relationship_type: None, default: Some(DefaultValue::Generated) },
                Field { name: "name".to_string(), type_name: "Text".to_string(), optional: false, repeated: false, built_in: false, unique: false, foreign_key_field_name: None, relationship_type: None, default: None },
            ],
            operations: vec![Operation {
                name: "getPerson".to_string(),
                op_type: OperationType::Get,
                implementation: Implementation::Auto,
                model_name: "Person".to_string(),
                inputs: vec![OperationInput { label: None, field_path: vec!["id".to_string()], optional: false }],
                with_inputs: vec![],
                permissions: vec![],
                where_exprs: vec![],
                set_exprs: vec![],
            }],
        };
        Schema { models: vec![model], enums: vec![], roles: vec![Role { name: "Admin".to_string(), domains: vec!["example.com".to_string()], emails: vec![] }], env_vars: vec![], secrets: vec![] }
    }

    #[test]
    fn implicit_filter_binds_named_input_by_its_field_path() {
        let schema = person_schema();
        let model = schema.model("Person").unwrap();
        let operation = model.operation("getPerson").unwrap();
        let mut inputs = JsonMap::new();
        inputs.insert("id".to_string(), serde_json::json!("k1"));

        let mut qb = QueryBuilder::new("Person");
        let mut any_filter = false;
        apply_implicit_filters(&mut qb, model, &schema, operation, &inputs, &mut any_filter).unwrap();
        assert!(any_filter);

        let stmt = qb.select_statement();
        assert_eq!(stmt.template.matches('?').count(), stmt.args.len());
        assert_eq!(stmt.args, vec![serde_json::json!("k1")]);
    }

    #[test]
    fn missing_required_input_is_an_invalid_input_error() {
        let schema = person_schema();
        let model = schema.model("Person").unwrap();
        let operation = model.operation("getPerson").unwrap();
        let mut qb = QueryBuilder::new("Person");
        let mut any_filter = false;
        let err = apply_implicit_filters(&mut qb, model, &schema, operation, &JsonMap::new(), &mut any_filter).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidInput(_)));
    }

    #[test]
    fn role_based_permission_matches_on_identity_domain() {
        let schema = person_schema();
        let mut identity = JsonMap::new();
        identity.insert("email".to_string(), serde_json::json!("ada@example.com"));
        let ctx = RequestContext::new().with_identity(identity);
        assert!(identity_has_role(&schema, "Admin", &ctx));
    }

    #[test]
    fn role_based_permission_rejects_unmatched_domain() {
        let schema = person_schema();
        let mut identity = JsonMap::new();
        identity.insert("email".to_string(), serde_json::json!("ada@other.com"));
        let ctx = RequestContext::new().with_identity(identity);
        assert!(!identity_has_role(&schema, "Admin", &ctx));
    }

    #[test]
    fn no_permission_rules_at_all_denies_create() {
        let schema = person_schema();
        let model = schema.model("Person").unwrap();
        let mut operation = model.operation("getPerson").unwrap().clone();
        operation.permissions = vec![keel_proto::PermissionRule::Role("Admin".to_string())];
        let ctx = RequestContext::new();
        assert!(matches!(authorize_create(&schema, &operation, &ctx), Err(RuntimeError::NotAuthorized)));
    }

    #[test]
    fn build_create_row_generates_id_and_timestamps() {
        let schema = person_schema();
        let model = schema.model("Person").unwrap();
        let mut operation = model.operation("getPerson").unwrap().clone();
        operation.op_type = OperationType::Create;
        operation.inputs = vec![OperationInput { label: None, field_path: vec!["name".to_string()], optional: false }];
        let mut inputs = JsonMap::new();
        inputs.insert("name".to_string(), serde_json::json!("Ada"));
        let ctx = RequestContext::new();

        let row = build_create_row(&schema, model, &operation, &inputs, &ctx).unwrap();
        assert!(matches!(row.values.get("id"), Some(keel_db::CellValue::Literal(JsonValue::String(_)))));
        assert!(matches!(row.values.get("name"), Some(keel_db::CellValue::Literal(JsonValue::String(s))) if s == "Ada"));
    }

    #[test]
    fn parse_page_defaults_to_unlimited_first_page() {
        let page = parse_page(&JsonMap::new());
        assert_eq!(page.first, 0);
        assert_eq!(page.last, 0);
        assert!(page.after.is_none());
    }

    #[test]
    fn has_many_relation_type_is_recognized_for_nested_create() {
        assert_eq!(RelationshipType::HasMany, RelationshipType::HasMany);
    }
}
