//! Field type resolvability. Grounded on
//! `original_source/schema/validation/rules/field/field.go`: every field's
//! type name must be either a built-in scalar or a model/enum/message
//! declared somewhere in the schema set.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{is_built_in_field_type, query, Ast};

pub fn field_types_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        for field in query::model_fields(model) {
            if field.built_in || is_built_in_field_type(&field.type_name) {
                continue;
            }
            if !query::is_user_defined_type(asts, &field.type_name) {
                errors.push(
                    ValidationError::new(ErrorCode::UnresolvableType, field.type_position)
                        .with("Type", field.type_name.clone())
                        .with("Field", field.name.value.clone()),
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
    fn flags_unknown_field_type() {
        let asts = parse("model Person { fields { pet Animal } }");
        let errors = field_types_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::UnresolvableType));
    }

    #[test]
    fn accepts_model_and_enum_field_types() {
        let asts = parse(
            r#"
            enum Status { Active Inactive }
            model Pet { fields { name Text } }
            model Person {
                fields {
                    pet Pet
                    status Status
                }
            }
            "#,
        );
        assert!(field_types_rule(&asts).is_empty());
    }
}
