//! Uniqueness rules: field names within a model, model names across the
//! whole schema, action names across the whole schema (actions live in a
//! flat namespace at runtime regardless of which model they hang off).

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast};
use std::collections::HashMap;

pub fn uniqueness_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut model_names: HashMap<&str, usize> = HashMap::new();
    for model in query::models(asts) {
        let count = model_names.entry(model.name.value.as_str()).or_insert(0);
        *count += 1;
        if *count > 1 {
            errors.push(
                ValidationError::new(ErrorCode::DuplicateDeclarationName, model.name.position)
                    .with("Name", model.name.value.clone()),
            );
        }
    }

    let mut action_names: HashMap<&str, usize> = HashMap::new();
    for model in query::models(asts) {
        let mut field_names: HashMap<&str, usize> = HashMap::new();
        for field in query::model_fields(model) {
            let count = field_names.entry(field.name.value.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                errors.push(
                    ValidationError::new(ErrorCode::DuplicateFieldName, field.name.position)
                        .with("Name", field.name.value.clone())
                        .with("Model", model.name.value.clone()),
                );
            }
        }

        for action in query::model_actions(model) {
            let count = action_names.entry(action.name.value.as_str()).or_insert(0);
            *count += 1;
            if *count > 1 {
                errors.push(
                    ValidationError::new(ErrorCode::DuplicateActionName, action.position)
                        .with("Name", action.name.value.clone()),
                );
            }
        }
    }

    errors
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
    fn flags_duplicate_model() {
        let asts = parse(
            "model Person { fields { name Text } }\nmodel Person { fields { age Number } }",
        );
        let errors = uniqueness_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::DuplicateDeclarationName));
    }

    #[test]
    fn flags_duplicate_field() {
        let asts = parse("model Person { fields { name Text name Text } }");
        let errors = uniqueness_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::DuplicateFieldName));
    }

    #[test]
    fn flags_duplicate_action_across_models() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text }
                operations { get getThing(id) }
            }
            model Pet {
                fields { name Text }
                operations { get getThing(id) }
            }
            "#,
        );
        let errors = uniqueness_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::DuplicateActionName));
    }
}
