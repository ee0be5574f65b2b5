//! Read-only helper functions over a parsed `&[Ast]`. These never mutate and
//! never fail - they answer questions like "does a model with this name
//! exist" or "what are this model's unique fields", folding across every
//! file in the set since declarations can span files.

use crate::ast::*;

pub fn models<'a>(asts: &'a [Ast]) -> Vec<&'a ModelNode> {
    asts.iter()
        .flat_map(|a| &a.declarations)
        .filter_map(|d| match d {
            Declaration::Model(m) => Some(m),
            _ => None,
        })
        .collect()
}

pub fn model_names(asts: &[Ast]) -> Vec<&str> {
    models(asts).into_iter().map(|m| m.name.value.as_str()).collect()
}

pub fn model<'a>(asts: &'a [Ast], name: &str) -> Option<&'a ModelNode> {
    models(asts).into_iter().find(|m| m.name.value == name)
}

pub fn is_model(asts: &[Ast], name: &str) -> bool {
    model(asts, name).is_some()
}

pub fn enums<'a>(asts: &'a [Ast]) -> Vec<&'a EnumNode> {
    asts.iter()
        .flat_map(|a| &a.declarations)
        .filter_map(|d| match d {
            Declaration::Enum(e) => Some(e),
            _ => None,
        })
        .collect()
}

pub fn enum_by_name<'a>(asts: &'a [Ast], name: &str) -> Option<&'a EnumNode> {
    enums(asts).into_iter().find(|e| e.name.value == name)
}

pub fn is_enum(asts: &[Ast], name: &str) -> bool {
    enum_by_name(asts, name).is_some()
}

pub fn roles<'a>(asts: &'a [Ast]) -> Vec<&'a RoleNode> {
    asts.iter()
        .flat_map(|a| &a.declarations)
        .filter_map(|d| match d {
            Declaration::Role(r) => Some(r),
            _ => None,
        })
        .collect()
}

pub fn apis<'a>(asts: &'a [Ast]) -> Vec<&'a ApiNode> {
    asts.iter()
        .flat_map(|a| &a.declarations)
        .filter_map(|d| match d {
            Declaration::Api(a) => Some(a),
            _ => None,
        })
        .collect()
}

pub fn messages<'a>(asts: &'a [Ast]) -> Vec<&'a MessageNode> {
    asts.iter()
        .flat_map(|a| &a.declarations)
        .filter_map(|d| match d {
            Declaration::Message(m) => Some(m),
            _ => None,
        })
        .collect()
}

pub fn message_by_name<'a>(asts: &'a [Ast], name: &str) -> Option<&'a MessageNode> {
    messages(asts).into_iter().find(|m| m.name.value == name)
}

/// True for any type name that refers to a model, enum or message declared
/// in the schema, as opposed to a built-in scalar (`Text`, `Number`, ...).
pub fn is_user_defined_type(asts: &[Ast], name: &str) -> bool {
    !is_built_in_field_type(name)
        && (is_model(asts, name) || is_enum(asts, name) || message_by_name(asts, name).is_some())
}

pub fn user_defined_types<'a>(asts: &'a [Ast]) -> Vec<&'a str> {
    let mut names: Vec<&str> = models(asts)
        .into_iter()
        .map(|m| m.name.value.as_str())
        .chain(enums(asts).into_iter().map(|e| e.name.value.as_str()))
        .chain(messages(asts).into_iter().map(|m| m.name.value.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

pub fn model_actions<'a>(model: &'a ModelNode) -> Vec<&'a ActionNode> {
    model.actions()
}

pub fn model_operations<'a>(model: &'a ModelNode) -> Vec<&'a ActionNode> {
    model.operations()
}

pub fn model_functions<'a>(model: &'a ModelNode) -> Vec<&'a ActionNode> {
    model.functions()
}

pub fn model_action_by_name<'a>(model: &'a ModelNode, name: &str) -> Option<&'a ActionNode> {
    model_actions(model).into_iter().find(|a| a.name.value == name)
}

pub fn model_fields<'a>(model: &'a ModelNode) -> Vec<&'a FieldNode> {
    model.fields()
}

pub fn model_field<'a>(model: &'a ModelNode, name: &str) -> Option<&'a FieldNode> {
    model.fields().into_iter().find(|f| f.name.value == name)
}

pub fn model_field_names(model: &ModelNode) -> Vec<&str> {
    model.fields().into_iter().map(|f| f.name.value.as_str()).collect()
}

pub fn field_has_attribute(field: &FieldNode, name: &str) -> bool {
    field.has_attribute(name)
}

pub fn field_is_unique(field: &FieldNode) -> bool {
    field.is_unique()
}

/// True if `type_name` names a model and that model has a `to-one`
/// relationship back to `owner` (i.e. this field, if added, would be the
/// "many" side of a 1:M, or a scalar FK for 1:1). Relationship cardinality
/// itself is a validation concern; this only answers "is it a model type".
pub fn field_is_model_relation(asts: &[Ast], field: &FieldNode) -> bool {
    is_model(asts, &field.type_name)
}

/// Resolves a dotted input path (e.g. `post.author.email`) against a
/// starting model, returning the chain of fields walked. Fails (returns
/// `None`) as soon as a fragment doesn't name a field on the current model,
/// or the path runs through a non-model field before its end.
pub fn resolve_input_type<'a>(
    asts: &'a [Ast],
    start_model: &'a ModelNode,
    fragments: &[Ident],
) -> Option<Vec<&'a FieldNode>> {
    let mut chain = Vec::new();
    let mut current = start_model;

    for (i, fragment) in fragments.iter().enumerate() {
        let field = model_field(current, &fragment.value)?;
        chain.push(field);

        let is_last = i == fragments.len() - 1;
        if !is_last {
            current = model(asts, &field.type_name)?;
        }
    }

    Some(chain)
}

/// Resolves a single input field by path, returning only the final field in
/// the chain (the common case for simple, non-nested inputs).
pub fn resolve_input_field<'a>(
    asts: &'a [Ast],
    start_model: &'a ModelNode,
    fragments: &[Ident],
) -> Option<&'a FieldNode> {
    resolve_input_type(asts, start_model, fragments)?.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_sources, SchemaFile};

    fn parse(src: &str) -> Vec<Ast> {
        let files = vec![SchemaFile::new("a.keel", src)];
        let (asts, errors) = parse_sources(&files);
        assert!(errors.is_empty(), "{errors:?}");
        asts
    }

    #[test]
    fn finds_models_and_fields_across_files() {
        let asts = parse(
            r#"
            model Author {
                fields {
                    name Text
                }
            }
            model Post {
                fields {
                    title Text
                    author Author
                }
            }
            "#,
        );
        assert!(is_model(&asts, "Post"));
        assert!(!is_model(&asts, "Nope"));
        let post = model(&asts, "Post").unwrap();
        let author_field = model_field(post, "author").unwrap();
        assert!(field_is_model_relation(&asts, author_field));
    }

    #[test]
    fn resolves_dotted_input_path() {
        let asts = parse(
            r#"
            model Author {
                fields {
                    name Text
                }
            }
            model Post {
                fields {
                    title Text
                    author Author
                }
            }
            "#,
        );
        let post = model(&asts, "Post").unwrap();
        let fragments = vec![
            Ident::new("author", crate::position::Position::synthetic()),
            Ident::new("name", crate::position::Position::synthetic()),
        ];
        let field = resolve_input_field(&asts, post, &fragments).unwrap();
        assert_eq!(field.name.value, "name");
    }

    #[test]
    fn unresolvable_path_returns_none() {
        let asts = parse(
            r#"
            model Post {
                fields {
                    title Text
                }
            }
            "#,
        );
        let post = model(&asts, "Post").unwrap();
        let fragments = vec![Ident::new("missing", crate::position::Position::synthetic())];
        assert!(resolve_input_field(&asts, post, &fragments).is_none());
    }
}
