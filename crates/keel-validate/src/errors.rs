use keel_ast::{Position, TemplateLiterals};
use std::collections::HashMap;
use strum_macros::Display;

/// Stable, machine-readable identifiers for every schema validation failure.
/// Mirrors the `errorhandling` error-code constants of the upstream schema
/// compiler so downstream tooling (editors, CI annotators) can key off a
/// fixed string rather than parsing prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "PascalCase")]
pub enum ErrorCode {
    ParseError,
    UpperCamelName,
    LowerCamelName,
    ReservedFieldName,
    ReservedModelName,
    DuplicateDeclarationName,
    DuplicateFieldName,
    DuplicateActionName,
    UnresolvableType,
    UnresolvableField,
    InvalidActionType,
    ActionInputNotResolvable,
    UnreferencedInputLabel,
    CreateOperationNoReadOnlyInput,
    CreateOperationMissingInput,
    OperationInputNotUnique,
    NonDirectComparisonOnUniqueLookup,
    AmbiguousRelationship,
    AttributeNotAllowed,
    AttributeArgCount,
    AttributeExpressionError,
    SetExpressionLhsNotIdentifier,
    RoleAttributeInvalid,
}

/// A single validation failure: the stable `code`, the `Position` it
/// occurred at, and the template literal values needed to render a
/// human-facing message (rendering itself lives in a presentation layer
/// outside this crate).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub position: Position,
    pub template_literals: TemplateLiterals,
}

impl ValidationError {
    pub fn new(code: ErrorCode, position: Position) -> Self {
        Self {
            code,
            position,
            template_literals: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template_literals.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.position, self.code)
    }
}

impl std::error::Error for ValidationError {}
