pub mod errors;
pub mod normalize;
pub mod resolver;
pub mod rules;

pub use errors::{ErrorCode, ValidationError};
pub use normalize::inject_implicit_fields;
pub use resolver::{allowed_operators, Resolver, ScopeEntity};
pub use rules::run_all;

use keel_ast::Ast;

/// Runs the full validation pipeline: inject implicit fields, then every
/// rule in [`rules::ALL_RULES`]. This is the entrypoint `keel-cli` and
/// `keel-proto`'s lowering both call before trusting an AST set.
pub fn validate(asts: &[Ast]) -> Vec<ValidationError> {
    let normalized = inject_implicit_fields(asts);
    run_all(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_ast::parser::{parse_sources, SchemaFile};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn parse(src: &str) -> Vec<Ast> {
        let files = vec![SchemaFile::new("a.keel", src)];
        let (asts, errors) = parse_sources(&files);
        assert!(errors.is_empty(), "{errors:?}");
        asts
    }

    #[test]
    fn clean_schema_validates() {
        let asts = parse(
            r#"
            model Person {
                fields {
                    firstName Text @unique
                }
                operations {
                    get getPerson(id)
                }
            }
            "#,
        );
        assert!(validate(&asts).is_empty());
    }

    #[test]
    fn reserved_field_name_is_flagged() {
        let asts = parse("model Person { fields { id Text } }");
        let errors = validate(&asts);
        assert_eq!(
            errors.iter().filter(|e| e.code == ErrorCode::ReservedFieldName).count(),
            1
        );
    }

    /// Validation is order-independent: shuffling the rule list must not
    /// change the resulting error set, only its iteration order.
    #[test]
    fn order_independent() {
        let asts = parse(
            r#"
            model person {
                fields {
                    id Text
                    name Text
                    name Text
                }
                operations {
                    get getByAge(name)
                }
            }
            "#,
        );
        let normalized = inject_implicit_fields(&asts);
        let baseline = rules::run_all(&normalized);

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut shuffled_rules: Vec<_> = rules::ALL_RULES.to_vec();
        shuffled_rules.shuffle(&mut rng);
        let mut shuffled: Vec<_> = shuffled_rules
            .iter()
            .flat_map(|rule| rule(&normalized))
            .collect();
        let mut baseline_sorted = baseline.clone();
        shuffled.sort_by_key(|e| format!("{:?}", e));
        baseline_sorted.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(baseline_sorted, shuffled);
    }
}
