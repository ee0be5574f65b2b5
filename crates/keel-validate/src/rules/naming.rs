//! Casing and reserved-name rules. Grounded on
//! `original_source/schema/validation/rules/model/model.go` and `field/field.go`:
//! models/actions/enums are UpperCamel, fields/action-args are lowerCamel, and a
//! short list of built-in names can't be redeclared.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast, Declaration, Ident};
use regex::Regex;

const RESERVED_FIELD_NAMES: &[&str] = &["id", "createdAt", "updatedAt"];
const RESERVED_MODEL_NAMES: &[&str] = &["Query"];

fn upper_camel_re() -> Regex {
    Regex::new(r"^[A-Z][A-Za-z0-9]*$").unwrap()
}

fn lower_camel_re() -> Regex {
    Regex::new(r"^[a-z][A-Za-z0-9]*$").unwrap()
}

fn check_casing(ident: &Ident, re: &Regex, code: ErrorCode) -> Option<ValidationError> {
    if re.is_match(&ident.value) {
        None
    } else {
        Some(ValidationError::new(code, ident.position).with("Name", ident.value.clone()))
    }
}

pub fn naming_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let upper = upper_camel_re();
    let lower = lower_camel_re();
    let mut errors = Vec::new();

    for decl in asts.iter().flat_map(|a| &a.declarations) {
        match decl {
            Declaration::Model(m) => {
                errors.extend(check_casing(&m.name, &upper, ErrorCode::UpperCamelName));
                for f in query::model_fields(m) {
                    errors.extend(check_casing(&f.name, &lower, ErrorCode::LowerCamelName));
                }
                for a in query::model_actions(m) {
                    errors.extend(check_casing(&a.name, &lower, ErrorCode::LowerCamelName));
                    for input in a.inputs.iter().chain(a.with.iter()) {
                        if let Some(label) = &input.label {
                            errors.extend(check_casing(label, &lower, ErrorCode::LowerCamelName));
                        }
                    }
                }
            }
            Declaration::Enum(e) => {
                errors.extend(check_casing(&e.name, &upper, ErrorCode::UpperCamelName));
                for v in &e.values {
                    errors.extend(check_casing(v, &upper, ErrorCode::UpperCamelName));
                }
            }
            Declaration::Role(r) => {
                errors.extend(check_casing(&r.name, &upper, ErrorCode::UpperCamelName));
            }
            Declaration::Api(api) => {
                errors.extend(check_casing(&api.name, &upper, ErrorCode::UpperCamelName));
            }
            Declaration::Message(m) => {
                errors.extend(check_casing(&m.name, &upper, ErrorCode::UpperCamelName));
                for f in &m.fields {
                    errors.extend(check_casing(&f.name, &lower, ErrorCode::LowerCamelName));
                }
            }
        }
    }

    errors
}

pub fn reserved_names_rule(asts: &[Ast]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for model in query::models(asts) {
        if RESERVED_MODEL_NAMES.contains(&model.name.value.as_str()) {
            errors.push(
                ValidationError::new(ErrorCode::ReservedModelName, model.name.position)
                    .with("Name", model.name.value.clone())
                    .with("Suggestion", format!("{}er", model.name.value)),
            );
        }
        for field in query::model_fields(model) {
            if field.built_in {
                continue;
            }
            if RESERVED_FIELD_NAMES.contains(&field.name.value.as_str()) {
                errors.push(
                    ValidationError::new(ErrorCode::ReservedFieldName, field.name.position)
                        .with("Name", field.name.value.clone())
                        .with("Suggestion", format!("{}er", field.name.value)),
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
    fn flags_lowercase_model_name() {
        let asts = parse("model person { fields { name Text } }");
        let errors = naming_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::UpperCamelName));
    }

    #[test]
    fn flags_reserved_field_name() {
        let asts = parse("model Person { fields { createdAt Text } }");
        let errors = reserved_names_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::ReservedFieldName));
    }

    /// `spec.md` §8 scenario 2: field `id` produces exactly one
    /// `ReservedFieldName` error with suggestion `ider`.
    #[test]
    fn reserved_field_name_suggests_er_suffix() {
        let asts = parse("model Person { fields { id Text } }");
        let errors = reserved_names_rule(&asts);
        let matching: Vec<_> = errors.iter().filter(|e| e.code == ErrorCode::ReservedFieldName).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].template_literals.get("Suggestion").map(String::as_str), Some("ider"));
    }

    #[test]
    fn accepts_well_formed_names() {
        let asts = parse("model Person { fields { firstName Text } operations { get getPerson(id) } }");
        assert!(naming_rule(&asts).is_empty());
        assert!(reserved_names_rule(&asts).is_empty());
    }
}
