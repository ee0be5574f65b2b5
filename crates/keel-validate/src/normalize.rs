//! Injects the built-in fields (`id`, `createdAt`, `updatedAt`) onto every
//! model before the rule engine runs, mirroring the upstream compiler's
//! practice of merging these into `Model.Fields` immediately after parsing
//! rather than leaving rules to special-case their absence. `keel-proto`'s
//! lowering performs the same injection (plus foreign-key synthesis) when it
//! builds the runtime schema; the two are independent, narrowly-scoped
//! copies of the same constant list rather than a shared dependency, since
//! `keel-proto` does not depend on this crate.

use keel_ast::{
    AttributeNode, Ast, Declaration, FieldNode, Ident, ModelNode, Position, ATTRIBUTE_PRIMARY_KEY,
    BUILT_IN_FIELD_NAMES,
};

fn builtin_field(name: &'static str) -> FieldNode {
    let position = Position::synthetic();
    let type_name = match name {
        "id" => "ID",
        "createdAt" | "updatedAt" => "Timestamp",
        _ => "Text",
    };
    let attributes = if name == "id" {
        vec![AttributeNode {
            name: Ident::new(ATTRIBUTE_PRIMARY_KEY, position),
            arguments: Vec::new(),
            position,
        }]
    } else {
        Vec::new()
    };

    FieldNode {
        name: Ident::new(name, position),
        type_name: type_name.to_string(),
        type_position: position,
        optional: false,
        repeated: false,
        built_in: true,
        attributes,
        position,
    }
}

fn normalize_model(model: &ModelNode) -> ModelNode {
    let mut model = model.clone();
    let existing: Vec<&str> = model.fields().into_iter().map(|f| f.name.value.as_str()).collect();
    let missing: Vec<FieldNode> = BUILT_IN_FIELD_NAMES
        .iter()
        .filter(|name| !existing.contains(name))
        .map(|name| builtin_field(name))
        .collect();

    if !missing.is_empty() {
        model.sections.push(keel_ast::Section {
            fields: missing,
            ..Default::default()
        });
    }

    model
}

/// Returns a copy of `asts` where every model carries its built-in fields,
/// so rules that walk `query::model_fields` never need to special-case
/// `id`/`createdAt`/`updatedAt`.
pub fn inject_implicit_fields(asts: &[Ast]) -> Vec<Ast> {
    asts.iter()
        .map(|ast| Ast {
            filename: ast.filename,
            declarations: ast
                .declarations
                .iter()
                .map(|decl| match decl {
                    Declaration::Model(m) => Declaration::Model(normalize_model(m)),
                    other => other.clone(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_ast::parser::{parse_sources, SchemaFile};
    use keel_ast::query;

    #[test]
    fn adds_missing_builtins_only() {
        let files = vec![SchemaFile::new(
            "a.keel",
            "model Person { fields { name Text } }",
        )];
        let (asts, _) = parse_sources(&files);
        let normalized = inject_implicit_fields(&asts);
        let model = query::model(&normalized, "Person").unwrap();
        let names = query::model_field_names(model);
        assert!(names.contains(&"id"));
        assert!(names.contains(&"createdAt"));
        assert!(names.contains(&"updatedAt"));
        assert_eq!(names.iter().filter(|n| **n == "name").count(), 1);
    }
}
