use crate::position::Position;
use std::collections::HashMap;

pub const IMPLICIT_IDENTITY_MODEL_NAME: &str = "Identity";
pub const BUILT_IN_FIELD_NAMES: &[&str] = &["id", "createdAt", "updatedAt"];
pub const BUILT_IN_FIELD_TYPES: &[&str] = &[
    "Text", "Number", "Boolean", "Date", "Timestamp", "ID", "Image", "Identity",
];

pub const ACTION_TYPE_GET: &str = "get";
pub const ACTION_TYPE_LIST: &str = "list";
pub const ACTION_TYPE_CREATE: &str = "create";
pub const ACTION_TYPE_UPDATE: &str = "update";
pub const ACTION_TYPE_DELETE: &str = "delete";
pub const ACTION_TYPE_READ: &str = "read";
pub const ACTION_TYPE_WRITE: &str = "write";

pub const ATTRIBUTE_UNIQUE: &str = "unique";
pub const ATTRIBUTE_DEFAULT: &str = "default";
pub const ATTRIBUTE_PERMISSION: &str = "permission";
pub const ATTRIBUTE_WHERE: &str = "where";
pub const ATTRIBUTE_SET: &str = "set";
pub const ATTRIBUTE_PRIMARY_KEY: &str = "primaryKey";

pub fn is_built_in_field_type(s: &str) -> bool {
    BUILT_IN_FIELD_TYPES.contains(&s)
}

/// One parsed schema source file's worth of declarations.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub filename: &'static str,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Model(ModelNode),
    Enum(EnumNode),
    Role(RoleNode),
    Api(ApiNode),
    Message(MessageNode),
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub value: String,
    pub position: Position,
}

impl Ident {
    pub fn new(value: impl Into<String>, position: Position) -> Self {
        Self {
            value: value.into(),
            position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: Ident,
    pub built_in: bool,
    pub sections: Vec<Section>,
    pub position: Position,
}

impl ModelNode {
    pub fn fields(&self) -> Vec<&FieldNode> {
        self.sections.iter().flat_map(|s| s.fields.iter()).collect()
    }

    pub fn operations(&self) -> Vec<&ActionNode> {
        self.sections
            .iter()
            .flat_map(|s| s.operations.iter())
            .collect()
    }

    pub fn functions(&self) -> Vec<&ActionNode> {
        self.sections
            .iter()
            .flat_map(|s| s.functions.iter())
            .collect()
    }

    pub fn actions(&self) -> Vec<&ActionNode> {
        self.operations().into_iter().chain(self.functions()).collect()
    }

    pub fn attributes(&self) -> Vec<&AttributeNode> {
        self.sections.iter().filter_map(|s| s.attribute.as_ref()).collect()
    }
}

/// A `fields { }`, `operations { }`, `functions { }` block, or a bare
/// model-level `@attribute(...)`. Exactly one of these fields is populated.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub fields: Vec<FieldNode>,
    pub operations: Vec<ActionNode>,
    pub functions: Vec<ActionNode>,
    pub attribute: Option<AttributeNode>,
}

#[derive(Debug, Clone)]
pub struct FieldNode {
    pub name: Ident,
    pub type_name: String,
    pub type_position: Position,
    pub optional: bool,
    pub repeated: bool,
    pub built_in: bool,
    pub attributes: Vec<AttributeNode>,
    pub position: Position,
}

impl FieldNode {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name.value == name)
    }

    pub fn is_unique(&self) -> bool {
        self.has_attribute(ATTRIBUTE_UNIQUE) || self.has_attribute(ATTRIBUTE_PRIMARY_KEY)
    }
}

#[derive(Debug, Clone)]
pub struct AttributeNode {
    pub name: Ident,
    pub arguments: Vec<AttributeArgument>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct AttributeArgument {
    pub label: Option<Ident>,
    pub expression: Option<Expression>,
    pub position: Position,
}

/// The type reference for an action input: either a dotted field path
/// (`post.author.name`) or a bare built-in type name (`Text`).
#[derive(Debug, Clone)]
pub struct InputType {
    pub fragments: Vec<Ident>,
    pub position: Position,
}

impl InputType {
    pub fn to_string_path(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.value.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone)]
pub struct ActionInputNode {
    pub label: Option<Ident>,
    pub input_type: InputType,
    pub optional: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Get,
    List,
    Create,
    Update,
    Delete,
    Read,
    Write,
    Unknown(String),
}

impl ActionKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "get" => Self::Get,
            "list" => Self::List,
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "read" => Self::Read,
            "write" => Self::Write,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => ACTION_TYPE_GET,
            Self::List => ACTION_TYPE_LIST,
            Self::Create => ACTION_TYPE_CREATE,
            Self::Update => ACTION_TYPE_UPDATE,
            Self::Delete => ACTION_TYPE_DELETE,
            Self::Read => ACTION_TYPE_READ,
            Self::Write => ACTION_TYPE_WRITE,
            Self::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

#[derive(Debug, Clone)]
pub struct ActionNode {
    pub name: Ident,
    pub kind: ActionKind,
    pub kind_position: Position,
    pub is_function: bool,
    pub inputs: Vec<ActionInputNode>,
    pub with: Vec<ActionInputNode>,
    pub attributes: Vec<AttributeNode>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct EnumNode {
    pub name: Ident,
    pub values: Vec<Ident>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct RoleNode {
    pub name: Ident,
    pub domains: Vec<String>,
    pub emails: Vec<String>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct ApiNode {
    pub name: Ident,
    pub models: Vec<Ident>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct MessageNode {
    pub name: Ident,
    pub fields: Vec<FieldNode>,
    pub position: Position,
}

// --- Expressions -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Assign,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Assign => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<LiteralValue>),
}

#[derive(Debug, Clone)]
pub enum Operand {
    Ident(Vec<Ident>),
    Literal(LiteralValue, Position),
}

impl Operand {
    pub fn position(&self) -> Position {
        match self {
            Operand::Ident(fragments) => fragments.first().map(|i| i.position).unwrap_or_else(Position::synthetic),
            Operand::Literal(_, pos) => *pos,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Literal(..))
    }

    pub fn as_ident_path(&self) -> Option<Vec<&str>> {
        match self {
            Operand::Ident(fragments) => Some(fragments.iter().map(|i| i.value.as_str()).collect()),
            _ => None,
        }
    }

    pub fn to_string_path(&self) -> String {
        match self {
            Operand::Ident(fragments) => fragments
                .iter()
                .map(|i| i.value.as_str())
                .collect::<Vec<_>>()
                .join("."),
            Operand::Literal(lit, _) => format!("{lit:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub lhs: Operand,
    pub operator: Operator,
    pub operator_position: Position,
    pub rhs: Operand,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Condition(Condition),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// All leaf conditions, flattening `and`/`or` combinators. Matches the Go
    /// `expr.Conditions()` helper used throughout validation.
    pub fn conditions(&self) -> Vec<&Condition> {
        match self {
            Expression::Condition(c) => vec![c],
            Expression::And(l, r) | Expression::Or(l, r) => {
                let mut v = l.conditions();
                v.extend(r.conditions());
                v
            }
        }
    }

    /// True if this expression is a single assignment condition (`lhs = rhs`),
    /// the shape required for a `@set` attribute.
    pub fn as_assignment(&self) -> Option<&Condition> {
        match self {
            Expression::Condition(c) if c.operator == Operator::Assign => Some(c),
            _ => None,
        }
    }
}

pub type TemplateLiterals = HashMap<String, String>;
