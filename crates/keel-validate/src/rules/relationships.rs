//! Relationship cardinality checks. Grounded on
//! `original_source/schema/validation/rules/relationships/relationships.go`:
//! a 1:1 relationship is only unambiguous if exactly one side owns the
//! foreign key; two non-repeated fields pointing at each other leave it
//! unclear which model gets the `<name>Id` column, so that shape is
//! rejected at schema time rather than resolved by a tie-breaking rule.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast};

pub fn relationship_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let models = query::models(asts);

    for model in &models {
        for field in query::model_fields(model) {
            if field.repeated || !query::is_model(asts, &field.type_name) {
                continue;
            }
            let Some(other) = query::model(asts, &field.type_name) else { continue };
            if other.name.value == model.name.value {
                continue;
            }

            let reciprocal = query::model_fields(other)
                .into_iter()
                .any(|f| !f.repeated && f.type_name == model.name.value);

            if reciprocal {
                errors.push(
                    ValidationError::new(ErrorCode::AmbiguousRelationship, field.position)
                        .with("Field", field.name.value.clone())
                        .with("Model", model.name.value.clone())
                        .with("Other", other.name.value.clone()),
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
    fn flags_ambiguous_mutual_relation() {
        let asts = parse(
            r#"
            model Profile {
                fields {
                    person Person
                }
            }
            model Person {
                fields {
                    profile Profile
                }
            }
            "#,
        );
        let errors = relationship_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::AmbiguousRelationship));
    }

    #[test]
    fn one_directional_relation_is_fine() {
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
        assert!(relationship_rule(&asts).is_empty());
    }
}
