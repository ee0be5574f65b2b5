//! The normalized, immutable intermediate representation produced by
//! [`crate::lower::lower`]. Grounded on `spec.md` §3 "Proto schema" and
//! `original_source/model/schema.go`'s role as the stable artifact shared
//! between the compiler, the runtime dispatcher, and client codegen.
//!
//! `Field`/`Enum`/`EnvironmentVariable`/`Secret` - the parts of the schema a
//! client-code generator would actually serialize and walk - derive
//! `serde`/`schemars` so they can cross a process boundary per `spec.md` §6.
//! `Operation` carries live `keel_ast::Expression` trees for its
//! `@where`/`@set`/`@permission` bodies (consumed in-process by
//! `keel-db`/`keel-runtime`), so it stays `Debug`/`Clone` only rather than
//! pretending those trees have a stable wire format.

use keel_ast::Expression;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const IMPLICIT_IDENTITY_MODEL_NAME: &str = "Identity";

#[derive(Debug, Clone)]
pub struct Schema {
    pub models: Vec<Model>,
    pub enums: Vec<Enum>,
    pub roles: Vec<Role>,
    pub env_vars: Vec<EnvironmentVariable>,
    pub secrets: Vec<Secret>,
}

impl Schema {
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn enum_(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }
}

/// A declared `role { domains {...} emails {...} }` block - carried into
/// the proto schema (beyond what `spec.md` §3 enumerates explicitly) since
/// the dispatcher needs it to evaluate `@permission(role: X)` rules against
/// the caller's identity, the same way `original_source`'s runtime resolves
/// roles from `proto.Schema.Roles` rather than re-reading the AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Role {
    pub name: String,
    pub domains: Vec<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    pub operations: Vec<Operation>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.unique && f.name == "id")
    }

    /// The `belongsTo` field (if any) on this model whose type points back
    /// at `other_model` - i.e. the field that owns the foreign key a nested
    /// create under `other_model` would need filled in.
    pub fn belongs_to(&self, other_model: &str) -> Option<&Field> {
        self.fields.iter().find(|f| {
            f.relationship_type == Some(RelationshipType::BelongsTo) && f.type_name == other_model
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RelationshipType {
    HasMany,
    BelongsTo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum DefaultValue {
    /// `@default` with no argument: a runtime-generated value (KSUID for
    /// `id`, `now()` for timestamps).
    Generated,
    /// `@default("literal")`: the literal value itself, lowered from the
    /// attribute's expression argument.
    Literal(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    pub optional: bool,
    pub repeated: bool,
    pub built_in: bool,
    pub unique: bool,
    /// Only set on a `belongsTo` relation field: the name of the
    /// synthesized sibling column (`customer` -> `customerId`).
    pub foreign_key_field_name: Option<String>,
    pub relationship_type: Option<RelationshipType>,
    pub default: Option<DefaultValue>,
}

impl Field {
    pub fn is_relation(&self) -> bool {
        self.relationship_type.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    Auto,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Get,
    List,
    Create,
    Update,
    Delete,
    Read,
    Write,
}

impl OperationType {
    pub fn from_ast(kind: &keel_ast::ActionKind) -> Self {
        use keel_ast::ActionKind as K;
        match kind {
            K::Get => Self::Get,
            K::List => Self::List,
            K::Create => Self::Create,
            K::Update => Self::Update,
            K::Delete => Self::Delete,
            K::Read => Self::Read,
            K::Write => Self::Write,
            K::Unknown(_) => Self::Read,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationInput {
    pub label: Option<String>,
    pub field_path: Vec<String>,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub enum PermissionRule {
    Role(String),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub op_type: OperationType,
    pub implementation: Implementation,
    pub model_name: String,
    pub inputs: Vec<OperationInput>,
    pub with_inputs: Vec<OperationInput>,
    pub permissions: Vec<PermissionRule>,
    pub where_exprs: Vec<Expression>,
    pub set_exprs: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentVariable {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Secret {
    pub name: String,
}
