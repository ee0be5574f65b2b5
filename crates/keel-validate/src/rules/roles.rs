//! Role literal shape. Grounded on
//! `original_source/schema/validation/rules/model/model.go`'s role-block
//! handling: `domains(...)`/`emails(...)` only ever accept string literals
//! (the parser already discards any non-literal token in those argument
//! lists), so the remaining schema-author mistake worth catching here is a
//! domain/email string that's obviously malformed - e.g. a domain with no
//! dot, or an email with no `@`.

use crate::errors::{ErrorCode, ValidationError};
use keel_ast::{query, Ast, RoleNode};

fn check_role(role: &RoleNode) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for domain in &role.domains {
        if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            errors.push(
                ValidationError::new(ErrorCode::RoleAttributeInvalid, role.position)
                    .with("Role", role.name.value.clone())
                    .with("Domain", domain.clone()),
            );
        }
    }

    for email in &role.emails {
        if !email.contains('@') || !email.contains('.') {
            errors.push(
                ValidationError::new(ErrorCode::RoleAttributeInvalid, role.position)
                    .with("Role", role.name.value.clone())
                    .with("Email", email.clone()),
            );
        }
    }

    errors
}

pub fn role_literal_rule(asts: &[Ast]) -> Vec<ValidationError> {
    query::roles(asts).into_iter().flat_map(check_role).collect()
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
    fn flags_malformed_domain() {
        let asts = parse(r#"role Admin { domains("keel") }"#);
        let errors = role_literal_rule(&asts);
        assert!(errors.iter().any(|e| e.code == ErrorCode::RoleAttributeInvalid));
    }

    #[test]
    fn accepts_well_formed_role() {
        let asts = parse(r#"role Admin { domains("keel.so") emails("dev@keel.so") }"#);
        assert!(role_literal_rule(&asts).is_empty());
    }
}
