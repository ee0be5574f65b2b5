//! Action-level rules: valid action types, resolvable inputs, create-action
//! completeness, and the unique-lookup requirement for `get`/`update`.
//! Grounded on `original_source/schema/validation/rules/model/model.go`,
//! which runs these checks per action while walking each model's sections.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, ActionKind, ActionNode, Ast, Expression, FieldNode, ModelNode, Operand};

const VALID_ACTION_TYPES: &[&str] = &["get", "list", "create", "update", "delete", "read", "write"];

pub fn action_types_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for model in query::models(asts) {
        for action in query::model_actions(model) {
            if let ActionKind::Unknown(raw) = &action.kind {
                if !VALID_ACTION_TYPES.contains(&raw.as_str()) {
                    errors.push(
                        ValidationError::new(ErrorCode::InvalidActionType, action.kind_position)
                            .with("Type", raw.clone()),
                    );
                }
            }
        }
    }
    errors
}

pub fn action_inputs_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        for action in query::model_actions(model) {
            for input in action.inputs.iter().chain(action.with.iter()) {
                if query::resolve_input_type(asts, model, &input.input_type.fragments).is_none() {
                    errors.push(
                        ValidationError::new(ErrorCode::ActionInputNotResolvable, input.position)
                            .with("Path", input.input_type.to_string_path())
                            .with("Action", action.name.value.clone()),
                    );
                }
            }

            // Every labelled input must be referenced by the action's own
            // @where/@set expressions - an unreferenced label is dead and
            // almost always a typo against the field it meant to filter on.
            let referenced: Vec<String> = action
                .attributes
                .iter()
                .filter_map(|a| a.arguments.first())
                .filter_map(|arg| arg.expression.as_ref())
                .flat_map(|expr| expr.conditions())
                .flat_map(|c| [operand_first_fragment(&c.lhs), operand_first_fragment(&c.rhs)])
                .flatten()
                .collect();

            for input in &action.inputs {
                if let Some(label) = &input.label {
                    if !referenced.iter().any(|r| r == &label.value) {
                        errors.push(
                            ValidationError::new(ErrorCode::UnreferencedInputLabel, label.position)
                                .with("Name", label.value.clone())
                                .with("Action", action.name.value.clone()),
                        );
                    }
                }
            }
        }
    }

    errors
}

fn operand_first_fragment(operand: &Operand) -> Option<String> {
    match operand.as_ident_path() {
        Some(path) => path.first().map(|s| s.to_string()),
        None => None,
    }
}

pub fn create_action_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        for action in query::model_actions(model) {
            if action.kind != ActionKind::Create {
                continue;
            }

            for input in &action.with {
                if let Some(field) = query::resolve_input_field(asts, model, &input.input_type.fragments) {
                    if field.built_in {
                        errors.push(
                            ValidationError::new(ErrorCode::CreateOperationNoReadOnlyInput, input.position)
                                .with("Field", field.name.value.clone()),
                        );
                    }
                }
            }

            let set_fields = set_target_fields(model, action);
            let with_fields: Vec<&str> = action
                .with
                .iter()
                .filter_map(|i| i.input_type.fragments.last())
                .map(|i| i.value.as_str())
                .collect();

            for field in query::model_fields(model) {
                if field.built_in || field.optional || field.has_attribute("default") {
                    continue;
                }
                let covered = with_fields.contains(&field.name.value.as_str())
                    || set_fields.contains(&field.name.value.as_str());
                if !covered {
                    errors.push(
                        ValidationError::new(ErrorCode::CreateOperationMissingInput, action.position)
                            .with("Field", field.name.value.clone())
                            .with("Action", action.name.value.clone()),
                    );
                }
            }
        }
    }

    errors
}

fn set_target_fields<'a>(model: &'a ModelNode, action: &'a ActionNode) -> Vec<&'a str> {
    action
        .attributes
        .iter()
        .filter(|a| a.name.value == "set")
        .filter_map(|a| a.arguments.first())
        .filter_map(|arg| arg.expression.as_ref())
        .filter_map(|expr| expr.as_assignment())
        .filter_map(|c| c.lhs.as_ident_path())
        .filter_map(|path| path.last().copied())
        .filter(|name| query::model_field(model, name).is_some())
        .collect()
}

/// `@set`'s left-hand side must be a plain identifier path (`model.field`),
/// never a literal or a nested expression.
pub fn set_lhs_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for model in query::models(asts) {
        for action in query::model_actions(model) {
            for attr in &action.attributes {
                if attr.name.value != "set" {
                    continue;
                }
                for arg in &attr.arguments {
                    let Some(expr) = &arg.expression else { continue };
                    match expr {
                        Expression::Condition(c) if c.operator == keel_ast::Operator::Assign => {
                            if c.lhs.as_ident_path().is_none() {
                                errors.push(ValidationError::new(
                                    ErrorCode::SetExpressionLhsNotIdentifier,
                                    c.lhs.position(),
                                ));
                            }
                        }
                        _ => errors.push(ValidationError::new(
                            ErrorCode::AttributeExpressionError,
                            attr.position,
                        ).with("Attribute", "set".to_string())),
                    }
                }
            }
        }
    }
    errors
}

const DIRECT_OPERATORS: &[&str] = &["==", "in"];

/// `get`/`update` must filter on at least one unique/primary-key field using
/// a direct comparison; filtering only on non-unique fields, or filtering a
/// unique field with e.g. `startsWith`, makes the lookup's cardinality
/// ambiguous at runtime.
pub fn unique_lookup_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        for action in query::model_actions(model) {
            if !matches!(action.kind, ActionKind::Get | ActionKind::Update) {
                continue;
            }

            let mut has_unique_direct_filter = false;

            for input in &action.inputs {
                if let Some(field) = query::resolve_input_field(asts, model, &input.input_type.fragments) {
                    if field.is_unique() {
                        has_unique_direct_filter = true;
                    }
                }
            }

            for attr in action.attributes.iter().filter(|a| a.name.value == "where") {
                for arg in &attr.arguments {
                    let Some(expr) = &arg.expression else { continue };
                    for cond in expr.conditions() {
                        if let Some(field) = resolve_condition_field(asts, model, &cond.lhs) {
                            if field.is_unique() {
                                if DIRECT_OPERATORS.contains(&cond.operator.symbol()) {
                                    has_unique_direct_filter = true;
                                } else {
                                    errors.push(ValidationError::new(
                                        ErrorCode::NonDirectComparisonOnUniqueLookup,
                                        cond.operator_position,
                                    ).with("Field", field.name.value.clone()));
                                }
                            }
                        }
                    }
                }
            }

            if !has_unique_direct_filter {
                errors.push(
                    ValidationError::new(ErrorCode::OperationInputNotUnique, action.position)
                        .with("Action", action.name.value.clone()),
                );
            }
        }
    }

    errors
}

fn resolve_condition_field<'a>(asts: &'a [Ast], model: &'a ModelNode, operand: &Operand) -> Option<&'a FieldNode> {
    let path = operand.as_ident_path()?;
    if path.first().copied() != Some(&lower_camel_of(model)[..]) {
        return None;
    }
    query::model_field(model, *path.last()?)
}

fn lower_camel_of(model: &ModelNode) -> String {
    let mut chars = model.name.value.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
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
    fn get_without_unique_filter_is_flagged() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text }
                operations { get getPerson(name) }
            }
            "#,
        );
        let errors = unique_lookup_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::OperationInputNotUnique));
    }

    #[test]
    fn get_by_id_is_accepted() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text }
                operations { get getPerson(id) }
            }
            "#,
        );
        assert!(unique_lookup_rule(&asts).is_empty());
    }

    #[test]
    fn create_requires_every_required_field() {
        let asts = parse(
            r#"
            model Person {
                fields {
                    name Text
                    age Number
                }
                operations {
                    create createPerson() with (name)
                }
            }
            "#,
        );
        let errors = create_action_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::CreateOperationMissingInput));
    }
}
