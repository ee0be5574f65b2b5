//! Attribute argument arity. Grounded on
//! `original_source/schema/validation/rules/model/model.go`: `@unique` and
//! `@default` are valid either bare or with a single expression argument;
//! `@where`/`@set`/`@permission` each require exactly one expression
//! argument. Anything else is a schema-author mistake caught here rather
//! than surfacing as a confusing lowering failure later.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast, AttributeNode};

const ZERO_OR_ONE_ARG: &[&str] = &["unique", "default", "primaryKey"];
const EXACTLY_ONE_ARG: &[&str] = &["where", "set", "permission"];

fn check_attribute(attr: &AttributeNode) -> Option<ValidationError> {
    let name = attr.name.value.as_str();
    let count = attr.arguments.len();

    if ZERO_OR_ONE_ARG.contains(&name) {
        if count > 1 {
            return Some(
                ValidationError::new(ErrorCode::AttributeArgCount, attr.position)
                    .with("Attribute", name.to_string())
                    .with("Count", count.to_string()),
            );
        }
        return None;
    }

    if EXACTLY_ONE_ARG.contains(&name) {
        if count != 1 {
            return Some(
                ValidationError::new(ErrorCode::AttributeArgCount, attr.position)
                    .with("Attribute", name.to_string())
                    .with("Count", count.to_string()),
            );
        }
        if attr.arguments[0].expression.is_none() {
            return Some(
                ValidationError::new(ErrorCode::AttributeExpressionError, attr.position)
                    .with("Attribute", name.to_string()),
            );
        }
        return None;
    }

    None
}

pub fn attribute_arity_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        for field in query::model_fields(model) {
            errors.extend(field.attributes.iter().filter_map(check_attribute));
        }
        for action in query::model_actions(model) {
            errors.extend(action.attributes.iter().filter_map(check_attribute));
        }
        errors.extend(model.attributes().into_iter().filter_map(check_attribute));
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
    fn where_without_expression_is_flagged() {
        let asts = parse(
            r#"
            model Person {
                fields { name Text }
                operations {
                    list listPeople() {
                        @where()
                    }
                }
            }
            "#,
        );
        let errors = attribute_arity_rule(&asts);
        assert!(errors
            .iter()
            .any(|e| e.code == ErrorCode::AttributeArgCount || e.code == ErrorCode::AttributeExpressionError));
    }

    #[test]
    fn bare_unique_is_fine() {
        let asts = parse("model Person { fields { name Text @unique } }");
        assert!(attribute_arity_rule(&asts).is_empty());
    }
}
