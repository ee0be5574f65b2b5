//! The rule engine: each rule is a plain `fn(&[Ast]) -> Vec<ValidationError>`,
//! composed by [`run_all`]. Rules never see each other's output and the
//! engine never short-circuits, so callers always get the full error set in
//! one pass regardless of which rule ran first (see `run_all`'s doc test and
//! `validate::tests::order_independent`).

pub mod actions;
pub mod attributes;
pub mod fields;
pub mod naming;
pub mod relationships;
pub mod roles;
pub mod uniqueness;

use crate::errors::ValidationError;
use keel_ast::Ast;

type Rule = fn(&[Ast]) -> Vec<ValidationError>;

/// Every rule the compiler runs, in the order listed in `SPEC_FULL.md` §4.
/// The order here is cosmetic - `run_all` makes no ordering guarantee to
/// callers, and `validate::tests::order_independent` shuffles this list to
/// prove it.
pub const ALL_RULES: &[Rule] = &[
    naming::naming_rule,
    naming::reserved_names_rule,
    uniqueness::uniqueness_rule,
    fields::field_types_rule,
    actions::action_types_rule,
    actions::action_inputs_rule,
    actions::create_action_rule,
    actions::set_lhs_rule,
    actions::unique_lookup_rule,
    relationships::relationship_rule,
    attributes::attribute_arity_rule,
    roles::role_literal_rule,
];

/// Runs every rule over `asts` and concatenates their errors. Order of the
/// rules in [`ALL_RULES`] does not affect the resulting set's membership,
/// only (possibly) its iteration order.
pub fn run_all(asts: &[Ast]) -> Vec<ValidationError> {
    ALL_RULES.iter().flat_map(|rule| rule(asts)).collect()
}
