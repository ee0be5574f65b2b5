//! Resolves operands (the dotted identifier paths used in `@where`/`@set`/
//! `@permission` expressions) against the schema, so the rule engine can
//! tell a valid field reference from a typo without re-implementing the
//! walk in every rule. Grounded on the upstream `ExpressionScope` design: a
//! linked list of scope frames, the root frame exposing `ctx.identity`/
//! `ctx.now` plus every declared enum.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast, EnumNode, FieldNode, Ident, LiteralValue, ModelNode, Operand, Position};

const IDENTITY_FIELDS: &[&str] = &["id", "email", "password", "emailVerified", "createdAt", "updatedAt"];

/// What a resolved dotted path points at. Each variant is one "stop" a path
/// can land on; `next_names` describes what further dotting from that stop
/// permits.
#[derive(Debug, Clone)]
pub enum ScopeEntity<'a> {
    Model(&'a ModelNode),
    Field(&'a FieldNode),
    Enum(&'a EnumNode),
    EnumValue(&'a Ident),
    Context,
    Identity,
    IdentityField(&'static str),
    Now,
    Literal(LiteralValue),
}

impl<'a> ScopeEntity<'a> {
    pub fn is_repeated(&self) -> bool {
        matches!(self, ScopeEntity::Field(f) if f.repeated)
    }

    /// The type name this entity would need to satisfy on the other side of
    /// a comparison operator ("Text", "Number", a model name, ...).
    pub fn type_name(&self) -> &str {
        match self {
            ScopeEntity::Model(m) => m.name.value.as_str(),
            ScopeEntity::Field(f) => f.type_name.as_str(),
            ScopeEntity::Enum(e) => e.name.value.as_str(),
            ScopeEntity::EnumValue(_) => "EnumValue",
            ScopeEntity::Context => "Context",
            ScopeEntity::Identity | ScopeEntity::IdentityField("id") => "Identity",
            ScopeEntity::IdentityField(name) if *name == "createdAt" || *name == "updatedAt" => "Timestamp",
            ScopeEntity::IdentityField(name) if *name == "emailVerified" => "Boolean",
            ScopeEntity::IdentityField(_) => "Text",
            ScopeEntity::Now => "Timestamp",
            ScopeEntity::Literal(LiteralValue::Text(_)) => "Text",
            ScopeEntity::Literal(LiteralValue::Number(_)) => "Number",
            ScopeEntity::Literal(LiteralValue::Boolean(_)) => "Boolean",
            ScopeEntity::Literal(LiteralValue::Null) => "Null",
            ScopeEntity::Literal(LiteralValue::Array(_)) => "Array",
        }
    }
}

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Ranks every candidate name against `target` with Jaro-Winkler similarity
/// and returns the best match, breaking ties alphabetically so suggestions
/// are deterministic across runs.
fn best_suggestion(target: &str, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .cloned()
        .map(|c| {
            let score = strsim::jaro_winkler(target, &c);
            (c, score)
        })
        .fold(None, |best, (candidate, score)| match best {
            None => Some((candidate, score)),
            Some((best_candidate, best_score)) => {
                if score > best_score || (score == best_score && candidate < best_candidate) {
                    Some((candidate, score))
                } else {
                    Some((best_candidate, best_score))
                }
            }
        })
        .map(|(candidate, _)| candidate)
}

fn unresolvable(fragment: &Ident, candidates: &[String]) -> ValidationError {
    let mut err = ValidationError::new(ErrorCode::UnresolvableField, fragment.position)
        .with("Name", fragment.value.clone());
    if let Some(suggestion) = best_suggestion(&fragment.value, candidates) {
        err = err.with("Suggestion", suggestion);
    }
    err
}

/// The root scope available to an expression written against `model`: the
/// model itself (bound under its lowerCamel name), `ctx`, and every
/// declared enum.
pub struct Resolver<'a> {
    asts: &'a [Ast],
    model: &'a ModelNode,
}

impl<'a> Resolver<'a> {
    pub fn new(asts: &'a [Ast], model: &'a ModelNode) -> Self {
        Self { asts, model }
    }

    fn root_names(&self) -> Vec<String> {
        let mut names = vec![lower_camel(&self.model.name.value), "ctx".to_string()];
        names.extend(query::enums(self.asts).into_iter().map(|e| e.name.value.clone()));
        names
    }

    fn resolve_root(&self, fragment: &Ident) -> Result<ScopeEntity<'a>, ValidationError> {
        if fragment.value == lower_camel(&self.model.name.value) {
            return Ok(ScopeEntity::Model(self.model));
        }
        if fragment.value == "ctx" {
            return Ok(ScopeEntity::Context);
        }
        if let Some(e) = query::enum_by_name(self.asts, &fragment.value) {
            return Ok(ScopeEntity::Enum(e));
        }
        Err(unresolvable(fragment, &self.root_names()))
    }

    fn next_names(&self, entity: &ScopeEntity<'a>) -> Vec<String> {
        match entity {
            ScopeEntity::Model(m) => query::model_field_names(m).into_iter().map(String::from).collect(),
            ScopeEntity::Field(f) => match query::model(self.asts, &f.type_name) {
                Some(m) => query::model_field_names(m).into_iter().map(String::from).collect(),
                None => Vec::new(),
            },
            ScopeEntity::Context => vec!["identity".to_string(), "now".to_string()],
            ScopeEntity::Identity => IDENTITY_FIELDS.iter().map(|s| s.to_string()).collect(),
            ScopeEntity::Enum(e) => e.values.iter().map(|v| v.value.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn step(&self, entity: ScopeEntity<'a>, fragment: &Ident) -> Result<ScopeEntity<'a>, ValidationError> {
        match entity {
            ScopeEntity::Model(m) => query::model_field(m, &fragment.value)
                .map(ScopeEntity::Field)
                .ok_or_else(|| unresolvable(fragment, &self.next_names(&ScopeEntity::Model(m)))),
            ScopeEntity::Field(f) => {
                let next_model = query::model(self.asts, &f.type_name)
                    .ok_or_else(|| unresolvable(fragment, &[]))?;
                query::model_field(next_model, &fragment.value)
                    .map(ScopeEntity::Field)
                    .ok_or_else(|| unresolvable(fragment, &self.next_names(&ScopeEntity::Field(f))))
            }
            ScopeEntity::Context => match fragment.value.as_str() {
                "identity" => Ok(ScopeEntity::Identity),
                "now" => Ok(ScopeEntity::Now),
                _ => Err(unresolvable(fragment, &self.next_names(&ScopeEntity::Context))),
            },
            ScopeEntity::Identity => IDENTITY_FIELDS
                .iter()
                .find(|name| **name == fragment.value)
                .map(|name| ScopeEntity::IdentityField(name))
                .ok_or_else(|| unresolvable(fragment, &self.next_names(&ScopeEntity::Identity))),
            ScopeEntity::Enum(e) => e
                .values
                .iter()
                .find(|v| v.value == fragment.value)
                .map(ScopeEntity::EnumValue)
                .ok_or_else(|| unresolvable(fragment, &self.next_names(&ScopeEntity::Enum(e)))),
            other => Err(unresolvable(fragment, &self.next_names(&other))),
        }
    }

    /// Walks a dotted identifier path from the root scope to its final
    /// entity, or a literal operand straight through.
    pub fn resolve(&self, operand: &Operand) -> Result<ScopeEntity<'a>, ValidationError> {
        match operand {
            Operand::Literal(value, _) => Ok(ScopeEntity::Literal(value.clone())),
            Operand::Ident(fragments) => {
                let mut iter = fragments.iter();
                let first = iter.next().ok_or_else(|| {
                    ValidationError::new(ErrorCode::UnresolvableField, Position::synthetic())
                })?;
                let mut entity = self.resolve_root(first)?;
                for fragment in iter {
                    entity = self.step(entity, fragment)?;
                }
                Ok(entity)
            }
        }
    }
}

/// Operators permitted between two resolved operand type names. Mirrors the
/// upstream `operand.go` table: equality works for any matching pair,
/// ordering/`startsWith` family only for compatible scalar kinds.
pub fn allowed_operators(lhs_type: &str, rhs_type: &str) -> &'static [&'static str] {
    if lhs_type != rhs_type && rhs_type != "Null" && lhs_type != "Null" {
        return &[];
    }
    match lhs_type {
        "Text" => &["==", "!=", "in", "notIn", "startsWith", "endsWith", "contains"],
        "Number" => &["==", "!=", "<", "<=", ">", ">="],
        "Timestamp" | "Date" => &["==", "!=", "<", "<=", ">", ">=", "before", "after", "onOrBefore", "onOrAfter"],
        "Boolean" => &["==", "!="],
        _ => &["==", "!=", "in", "notIn"],
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
    fn resolves_model_field() {
        let asts = parse(
            r#"
            model Post {
                fields {
                    title Text
                    published Boolean
                }
            }
            "#,
        );
        let model = query::model(&asts, "Post").unwrap();
        let resolver = Resolver::new(&asts, model);
        let operand = Operand::Ident(vec![
            Ident::new("post", Position::synthetic()),
            Ident::new("published", Position::synthetic()),
        ]);
        let entity = resolver.resolve(&operand).unwrap();
        assert_eq!(entity.type_name(), "Boolean");
    }

    #[test]
    fn resolves_ctx_identity_email() {
        let asts = parse("model Post { fields { title Text } }");
        let model = query::model(&asts, "Post").unwrap();
        let resolver = Resolver::new(&asts, model);
        let operand = Operand::Ident(vec![
            Ident::new("ctx", Position::synthetic()),
            Ident::new("identity", Position::synthetic()),
            Ident::new("email", Position::synthetic()),
        ]);
        let entity = resolver.resolve(&operand).unwrap();
        assert_eq!(entity.type_name(), "Text");
    }

    #[test]
    fn typo_produces_suggestion() {
        let asts = parse("model Post { fields { title Text } }");
        let model = query::model(&asts, "Post").unwrap();
        let resolver = Resolver::new(&asts, model);
        let operand = Operand::Ident(vec![
            Ident::new("post", Position::synthetic()),
            Ident::new("titel", Position::synthetic()),
        ]);
        let err = resolver.resolve(&operand).unwrap_err();
        assert_eq!(err.template_literals.get("Suggestion").map(String::as_str), Some("title"));
    }
}
