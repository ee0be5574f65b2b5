//! Lowers a validated set of `keel_ast::Ast` into the normalized
//! [`crate::schema::Schema`]. Grounded on `spec.md` §4.E: built-in fields
//! are injected, relation fields synthesize a `<name>Id` foreign key
//! sibling, `operations` sections lower to `Implementation::Auto` and
//! `functions` sections to `Implementation::Custom`, and the implicit
//! `Identity` model is always appended.
//!
//! Lowering never fails on its own: the caller is expected to have run
//! `keel_validate::validate` first and bailed out on any errors, so by the
//! time an `Ast` set reaches this module every type name, input path, and
//! attribute shape it touches is already known-good. Lowering a normalized
//! schema a second time (there being nothing left to rewrite) produces an
//! identical result, since every step here is a total function of the
//! input `Ast`s rather than an incremental mutation.

use crate::schema::*;
use keel_ast::{query, ActionNode, Ast, AttributeNode, Expression, FieldNode, ModelNode};

const PSEUDO_ENV_MODEL: &str = "Environment";
const PSEUDO_SECRETS_MODEL: &str = "Secrets";

fn default_value(asts: &[Ast], field: &FieldNode) -> Option<DefaultValue> {
    let attr = field.attributes.iter().find(|a| a.name.value == "default")?;
    match attr.arguments.first().and_then(|a| a.expression.as_ref()) {
        Some(Expression::Condition(c)) => Some(DefaultValue::Literal(literal_to_json(&c.rhs))),
        _ => {
            let _ = asts;
            Some(DefaultValue::Generated)
        }
    }
}

fn literal_to_json(operand: &keel_ast::Operand) -> serde_json::Value {
    use keel_ast::LiteralValue as L;
    match operand {
        keel_ast::Operand::Literal(L::Text(s), _) => serde_json::Value::String(s.clone()),
        keel_ast::Operand::Literal(L::Number(n), _) => serde_json::json!(n),
        keel_ast::Operand::Literal(L::Boolean(b), _) => serde_json::Value::Bool(*b),
        keel_ast::Operand::Literal(L::Null, _) => serde_json::Value::Null,
        keel_ast::Operand::Literal(L::Array(items), _) => {
            serde_json::Value::Array(items.iter().map(literal_value_to_json).collect())
        }
        keel_ast::Operand::Ident(fragments) => {
            serde_json::Value::String(fragments.iter().map(|i| i.value.as_str()).collect::<Vec<_>>().join("."))
        }
    }
}

fn literal_value_to_json(v: &keel_ast::LiteralValue) -> serde_json::Value {
    use keel_ast::LiteralValue as L;
    match v {
        L::Text(s) => serde_json::Value::String(s.clone()),
        L::Number(n) => serde_json::json!(n),
        L::Boolean(b) => serde_json::Value::Bool(*b),
        L::Null => serde_json::Value::Null,
        L::Array(items) => serde_json::Value::Array(items.iter().map(literal_value_to_json).collect()),
    }
}

/// Lowers one declared field, leaving relationship wiring (the `<name>Id`
/// sibling, `relationship_type`) to the caller since that needs sibling
/// knowledge of the whole model, not just this one field.
fn lower_field(asts: &[Ast], field: &FieldNode) -> Field {
    Field {
        name: field.name.value.clone(),
        type_name: field.type_name.clone(),
        optional: field.optional,
        repeated: field.repeated,
        built_in: field.built_in,
        unique: field.is_unique(),
        foreign_key_field_name: None,
        relationship_type: None,
        default: default_value(asts, field),
    }
}

/// Wires up relation fields on an already-lowered field list: non-repeated
/// model-typed fields become `belongsTo` and gain a `<name>Id` sibling
/// field; repeated model-typed fields become `hasMany` (their foreign key
/// lives on the other model, so no sibling is synthesized here). Ambiguous
/// mutual `belongsTo` relationships are already rejected by
/// `keel_validate::rules::relationships::relationship_rule` before this
/// runs, so that case never needs resolving here.
fn wire_relationships(asts: &[Ast], model: &ModelNode, mut fields: Vec<Field>) -> Vec<Field> {
    let mut extra = Vec::new();

    for field in fields.iter_mut() {
        if !query::is_model(asts, &field.type_name) || field.type_name == model.name.value {
            continue;
        }

        if field.repeated {
            field.relationship_type = Some(RelationshipType::HasMany);
        } else {
            let fk_name = format!("{}Id", field.name);
            field.foreign_key_field_name = Some(fk_name.clone());
            field.relationship_type = Some(RelationshipType::BelongsTo);
            extra.push(Field {
                name: fk_name,
                type_name: "ID".to_string(),
                optional: field.optional,
                repeated: false,
                built_in: true,
                unique: false,
                foreign_key_field_name: None,
                relationship_type: None,
                default: None,
            });
        }
    }

    fields.extend(extra);
    fields
}

fn lower_input(asts: &[Ast], model: &ModelNode, input: &keel_ast::ActionInputNode) -> OperationInput {
    let path = query::resolve_input_type(asts, model, &input.input_type.fragments)
        .map(|chain| chain.iter().map(|f| f.name.value.clone()).collect())
        .unwrap_or_else(|| vec![input.input_type.to_string_path()]);

    OperationInput {
        label: input.label.as_ref().map(|l| l.value.clone()),
        field_path: path,
        optional: input.optional,
    }
}

fn lower_permission(attr: &AttributeNode) -> Option<PermissionRule> {
    let arg = attr.arguments.first()?;
    if let Some(label) = &arg.label {
        if label.value == "role" {
            if let Some(Expression::Condition(c)) = &arg.expression {
                return Some(PermissionRule::Role(c.rhs.to_string_path()));
            }
        }
    }
    arg.expression.clone().map(PermissionRule::Expression)
}

fn lower_action(asts: &[Ast], model: &ModelNode, action: &ActionNode) -> Operation {
    let where_exprs: Vec<Expression> = action
        .attributes
        .iter()
        .filter(|a| a.name.value == "where")
        .filter_map(|a| a.arguments.first())
        .filter_map(|arg| arg.expression.clone())
        .collect();

    let set_exprs: Vec<Expression> = action
        .attributes
        .iter()
        .filter(|a| a.name.value == "set")
        .filter_map(|a| a.arguments.first())
        .filter_map(|arg| arg.expression.clone())
        .collect();

    let permissions: Vec<PermissionRule> = action
        .attributes
        .iter()
        .filter(|a| a.name.value == "permission")
        .filter_map(lower_permission)
        .collect();

    Operation {
        name: action.name.value.clone(),
        op_type: OperationType::from_ast(&action.kind),
        implementation: if action.is_function { Implementation::Custom } else { Implementation::Auto },
        model_name: model.name.value.clone(),
        inputs: action.inputs.iter().map(|i| lower_input(asts, model, i)).collect(),
        with_inputs: action.with.iter().map(|i| lower_input(asts, model, i)).collect(),
        permissions,
        where_exprs,
        set_exprs,
    }
}

fn lower_model(asts: &[Ast], model: &ModelNode) -> Model {
    let fields: Vec<Field> = query::model_fields(model).iter().map(|f| lower_field(asts, f)).collect();
    let fields = wire_relationships(asts, model, fields);
    let operations = query::model_actions(model).iter().map(|a| lower_action(asts, model, a)).collect();

    Model {
        name: model.name.value.clone(),
        fields,
        operations,
    }
}

fn is_pseudo_model(model: &ModelNode) -> bool {
    model.name.value == PSEUDO_ENV_MODEL || model.name.value == PSEUDO_SECRETS_MODEL
}

fn implicit_identity_model() -> Model {
    let builtin_text = |name: &str| Field {
        name: name.to_string(),
        type_name: "Text".to_string(),
        optional: false,
        repeated: false,
        built_in: true,
        unique: false,
        foreign_key_field_name: None,
        relationship_type: None,
        default: None,
    };

    Model {
        name: IMPLICIT_IDENTITY_MODEL_NAME.to_string(),
        fields: vec![
            Field {
                name: "id".to_string(),
                type_name: "ID".to_string(),
                optional: false,
                repeated: false,
                built_in: true,
                unique: true,
                foreign_key_field_name: None,
                relationship_type: None,
                default: None,
            },
            builtin_text("email"),
            builtin_text("password"),
            Field {
                name: "emailVerified".to_string(),
                type_name: "Boolean".to_string(),
                optional: false,
                repeated: false,
                built_in: true,
                unique: false,
                foreign_key_field_name: None,
                relationship_type: None,
                default: None,
            },
            Field {
                name: "createdAt".to_string(),
                type_name: "Timestamp".to_string(),
                optional: false,
                repeated: false,
                built_in: true,
                unique: false,
                foreign_key_field_name: None,
                relationship_type: None,
                default: None,
            },
            Field {
                name: "updatedAt".to_string(),
                type_name: "Timestamp".to_string(),
                optional: false,
                repeated: false,
                built_in: true,
                unique: false,
                foreign_key_field_name: None,
                relationship_type: None,
                default: None,
            },
        ],
        operations: Vec::new(),
    }
}

/// Lowers a (validated, built-in-fields-injected) AST set into the
/// normalized [`Schema`]. Callers should run `keel_validate::validate`
/// first and only call this once that returns no errors.
pub fn lower(asts: &[Ast]) -> Schema {
    let normalized = keel_validate::inject_implicit_fields(asts);

    let mut models: Vec<Model> = query::models(&normalized)
        .into_iter()
        .filter(|m| !is_pseudo_model(m))
        .map(|m| lower_model(&normalized, m))
        .collect();
    models.push(implicit_identity_model());

    let enums: Vec<Enum> = query::enums(&normalized)
        .into_iter()
        .map(|e| Enum {
            name: e.name.value.clone(),
            values: e.values.iter().map(|v| v.value.clone()).collect(),
        })
        .collect();

    let roles: Vec<Role> = query::roles(&normalized)
        .into_iter()
        .map(|r| Role {
            name: r.name.value.clone(),
            domains: r.domains.clone(),
            emails: r.emails.clone(),
        })
        .collect();

    let env_vars: Vec<EnvironmentVariable> = query::model(&normalized, PSEUDO_ENV_MODEL)
        .map(|m| {
            query::model_fields(m)
                .into_iter()
                .map(|f| EnvironmentVariable { name: f.name.value.clone() })
                .collect()
        })
        .unwrap_or_default();

    let secrets: Vec<Secret> = query::model(&normalized, PSEUDO_SECRETS_MODEL)
        .map(|m| {
            query::model_fields(m)
                .into_iter()
                .map(|f| Secret { name: f.name.value.clone() })
                .collect()
        })
        .unwrap_or_default();

    Schema { models, enums, roles, env_vars, secrets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_ast::parser::{parse_sources, SchemaFile};

    fn parse(src: &str) -> Vec<Ast> {
        let files = vec![SchemaFile::new("a.keel", src)];
        let (asts, errors) = parse_sources(&files);
        assert!(errors.is_empty(), "{errors:?}");
        asts
    }

    #[test]
    fn builtin_fields_present_exactly_once() {
        let asts = parse(
            r#"
            model Person {
                fields { firstName Text @unique }
            }
            "#,
        );
        let schema = lower(&asts);
        let person = schema.model("Person").unwrap();
        for name in ["id", "createdAt", "updatedAt"] {
            assert_eq!(person.fields.iter().filter(|f| f.name == name).count(), 1, "{name}");
        }
        assert!(schema.model(IMPLICIT_IDENTITY_MODEL_NAME).is_some());
    }

    #[test]
    fn relation_field_synthesizes_foreign_key() {
        let asts = parse(
            r#"
            model Author {
                fields { name Text }
            }
            model Post {
                fields {
                    title Text
                    author Author
                }
            }
            "#,
        );
        let schema = lower(&asts);
        let post = schema.model("Post").unwrap();
        let author_field = post.field("author").unwrap();
        assert_eq!(author_field.relationship_type, Some(RelationshipType::BelongsTo));
        assert_eq!(author_field.foreign_key_field_name.as_deref(), Some("authorId"));
        assert!(post.field("authorId").is_some());
    }

    #[test]
    fn repeated_relation_is_has_many_with_no_sibling() {
        let asts = parse(
            r#"
            model Item {
                fields { name Text }
            }
            model Sale {
                fields {
                    items Item[]
                }
            }
            "#,
        );
        let schema = lower(&asts);
        let sale = schema.model("Sale").unwrap();
        let items = sale.field("items").unwrap();
        assert_eq!(items.relationship_type, Some(RelationshipType::HasMany));
        assert!(items.foreign_key_field_name.is_none());
        assert!(sale.field("itemsId").is_none());
    }

    #[test]
    fn create_action_implementation_is_auto_function_is_custom() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text }
                operations {
                    create createPerson() with (name)
                }
                functions {
                    write renamePerson(id) with (name)
                }
            }
            "#,
        );
        let schema = lower(&asts);
        let person = schema.model("Person").unwrap();
        assert_eq!(person.operation("createPerson").unwrap().implementation, Implementation::Auto);
        assert_eq!(person.operation("renamePerson").unwrap().implementation, Implementation::Custom);
    }

    #[test]
    fn lowering_is_idempotent_given_the_same_ast_input() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text @unique }
                operations { get getPerson(id) }
            }
            "#,
        );
        let first = lower(&asts);
        let second = lower(&asts);
        assert_eq!(first.models.len(), second.models.len());
        for (a, b) in first.models.iter().zip(second.models.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.fields, b.fields);
            assert_eq!(a.operations.len(), b.operations.len());
        }
    }
}
