use crate::ast::*;
use crate::lexer::{tokenize, LexError};
use crate::position::Position;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self {
            message: e.message,
            position: e.position,
        }
    }
}

/// A schema source file as handed to the compiler: a path (leaked to `'static`
/// so AST nodes can cheaply carry position information without a lifetime
/// parameter) and its UTF-8 contents.
pub struct SchemaFile {
    pub filename: &'static str,
    pub contents: String,
}

impl SchemaFile {
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        let filename: String = filename.into();
        Self {
            filename: Box::leak(filename.into_boxed_str()),
            contents: contents.into(),
        }
    }
}

/// Parses every file independently. Cross-file references (a field typed as
/// a model declared in another file) are resolved later, during validation,
/// over the full `&[Ast]` slice - the parser itself never looks outside its
/// own token stream.
pub fn parse_sources(files: &[SchemaFile]) -> (Vec<Ast>, Vec<ParseError>) {
    let mut asts = Vec::new();
    let mut errors = Vec::new();

    for file in files {
        let (tokens, lex_errors) = tokenize(file.filename, &file.contents);
        errors.extend(lex_errors.into_iter().map(ParseError::from));

        let mut parser = Parser::new(file.filename, tokens);
        let ast = parser.parse_file();
        errors.extend(parser.errors);
        asts.push(ast);
    }

    (asts, errors)
}

struct Parser {
    filename: &'static str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(filename: &'static str, tokens: Vec<Token>) -> Self {
        Self {
            filename,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_position(&self) -> Position {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ParseError {
            message: message.into(),
            position: self.peek_position(),
        });
    }

    fn expect_ident(&mut self) -> Option<Ident> {
        let pos = self.peek_position();
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                self.bump();
                Some(Ident::new(s, pos))
            }
            other => {
                self.error(format!("expected identifier, found {other:?}"));
                None
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if *self.peek() == kind {
            self.bump();
            true
        } else {
            let found = self.peek().clone();
            self.error(format!("expected {kind:?}, found {found:?}"));
            false
        }
    }

    fn skip_to_recovery_point(&mut self) {
        // Best-effort recovery: skip tokens until the next declaration-ish
        // keyword or closing brace, so one malformed declaration doesn't
        // poison the rest of the file.
        while !self.at_eof() {
            match self.peek() {
                TokenKind::RBrace => {
                    self.bump();
                    return;
                }
                TokenKind::Ident(s)
                    if matches!(s.as_str(), "model" | "enum" | "role" | "api" | "message") =>
                {
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn parse_file(&mut self) -> Ast {
        let mut declarations = Vec::new();

        while !self.at_eof() {
            let before = self.pos;
            match self.peek().clone() {
                TokenKind::Ident(kw) if kw == "model" => {
                    if let Some(m) = self.parse_model() {
                        declarations.push(Declaration::Model(m));
                    }
                }
                TokenKind::Ident(kw) if kw == "enum" => {
                    if let Some(e) = self.parse_enum() {
                        declarations.push(Declaration::Enum(e));
                    }
                }
                TokenKind::Ident(kw) if kw == "role" => {
                    if let Some(r) = self.parse_role() {
                        declarations.push(Declaration::Role(r));
                    }
                }
                TokenKind::Ident(kw) if kw == "api" => {
                    if let Some(a) = self.parse_api() {
                        declarations.push(Declaration::Api(a));
                    }
                }
                TokenKind::Ident(kw) if kw == "message" => {
                    if let Some(m) = self.parse_message() {
                        declarations.push(Declaration::Message(m));
                    }
                }
                other => {
                    self.error(format!("unexpected top-level token {other:?}"));
                    self.bump();
                }
            }

            if self.pos == before {
                self.skip_to_recovery_point();
            }
        }

        Ast {
            filename: self.filename,
            declarations,
        }
    }

    fn parse_model(&mut self) -> Option<ModelNode> {
        let start = self.peek_position();
        self.bump(); // 'model'
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::LBrace) {
            self.skip_to_recovery_point();
            return None;
        }

        let mut sections = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            match self.peek().clone() {
                TokenKind::Ident(kw) if kw == "fields" => {
                    sections.push(self.parse_fields_section());
                }
                TokenKind::Ident(kw) if kw == "operations" => {
                    sections.push(self.parse_actions_section(false));
                }
                TokenKind::Ident(kw) if kw == "functions" => {
                    sections.push(self.parse_actions_section(true));
                }
                TokenKind::At => {
                    if let Some(attr) = self.parse_attribute() {
                        sections.push(Section {
                            attribute: Some(attr),
                            ..Default::default()
                        });
                    }
                }
                other => {
                    self.error(format!("unexpected token in model body {other:?}"));
                    self.bump();
                }
            }
        }
        self.expect(TokenKind::RBrace);

        Some(ModelNode {
            name,
            built_in: false,
            sections,
            position: start,
        })
    }

    fn parse_fields_section(&mut self) -> Section {
        self.bump(); // 'fields'
        self.expect(TokenKind::LBrace);
        let mut fields = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            if let Some(f) = self.parse_field() {
                fields.push(f);
            } else {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        Section {
            fields,
            ..Default::default()
        }
    }

    fn parse_field(&mut self) -> Option<FieldNode> {
        let start = self.peek_position();
        let name = self.expect_ident()?;
        let type_position = self.peek_position();
        let mut type_name = self.expect_ident()?.value;

        let mut repeated = false;
        if *self.peek() == TokenKind::LBracket {
            self.bump();
            self.expect(TokenKind::RBracket);
            repeated = true;
        }

        let mut optional = false;
        if *self.peek() == TokenKind::Question {
            self.bump();
            optional = true;
        }
        let _ = &mut type_name;

        let mut attributes = Vec::new();
        while *self.peek() == TokenKind::At {
            if let Some(attr) = self.parse_attribute() {
                attributes.push(attr);
            }
        }

        Some(FieldNode {
            name,
            type_name,
            type_position,
            optional,
            repeated,
            built_in: false,
            attributes,
            position: start,
        })
    }

    fn parse_actions_section(&mut self, is_function: bool) -> Section {
        self.bump(); // 'operations' | 'functions'
        self.expect(TokenKind::LBrace);
        let mut actions = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            if let Some(a) = self.parse_action(is_function) {
                actions.push(a);
            } else {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);

        if is_function {
            Section {
                functions: actions,
                ..Default::default()
            }
        } else {
            Section {
                operations: actions,
                ..Default::default()
            }
        }
    }

    fn parse_action(&mut self, is_function: bool) -> Option<ActionNode> {
        let start = self.peek_position();
        let kind_position = self.peek_position();
        let kind_str = self.expect_ident()?.value;
        let name = self.expect_ident()?;

        self.expect(TokenKind::LParen);
        let mut inputs = Vec::new();
        while *self.peek() != TokenKind::RParen && !self.at_eof() {
            if let Some(input) = self.parse_action_input() {
                inputs.push(input);
            }
            if *self.peek() == TokenKind::Comma {
                self.bump();
            }
        }
        self.expect(TokenKind::RParen);

        let mut with = Vec::new();
        if let TokenKind::Ident(kw) = self.peek().clone() {
            if kw == "with" {
                self.bump();
                self.expect(TokenKind::LParen);
                while *self.peek() != TokenKind::RParen && !self.at_eof() {
                    if let Some(input) = self.parse_action_input() {
                        with.push(input);
                    }
                    if *self.peek() == TokenKind::Comma {
                        self.bump();
                    }
                }
                self.expect(TokenKind::RParen);
            }
        }

        let mut attributes = Vec::new();
        if *self.peek() == TokenKind::LBrace {
            self.bump();
            while *self.peek() == TokenKind::At {
                if let Some(attr) = self.parse_attribute() {
                    attributes.push(attr);
                }
            }
            self.expect(TokenKind::RBrace);
        }

        Some(ActionNode {
            name,
            kind: ActionKind::from_str(&kind_str),
            kind_position,
            is_function,
            inputs,
            with,
            attributes,
            position: start,
        })
    }

    fn parse_action_input(&mut self) -> Option<ActionInputNode> {
        let start = self.peek_position();

        // Lookahead: `label: type` vs bare `type.path`.
        let save = self.pos;
        let maybe_label = self.expect_ident();
        let labelled = maybe_label.is_some() && *self.peek() == TokenKind::Colon;

        let label = if labelled {
            self.bump(); // ':'
            maybe_label
        } else {
            self.pos = save;
            None
        };

        let mut fragments = Vec::new();
        loop {
            let pos = self.peek_position();
            match self.expect_ident() {
                Some(ident) => fragments.push(ident),
                None => break,
            }
            if *self.peek() == TokenKind::Dot {
                self.bump();
            } else {
                let _ = pos;
                break;
            }
        }

        if fragments.is_empty() {
            return None;
        }

        let mut optional = false;
        if *self.peek() == TokenKind::Question {
            self.bump();
            optional = true;
        }

        Some(ActionInputNode {
            label,
            input_type: InputType {
                position: fragments[0].position,
                fragments,
            },
            optional,
            position: start,
        })
    }

    fn parse_attribute(&mut self) -> Option<AttributeNode> {
        let start = self.peek_position();
        self.bump(); // '@'
        let name = self.expect_ident()?;
        let mut arguments = Vec::new();

        if *self.peek() == TokenKind::LParen {
            self.bump();
            while *self.peek() != TokenKind::RParen && !self.at_eof() {
                arguments.push(self.parse_attribute_argument());
                if *self.peek() == TokenKind::Comma {
                    self.bump();
                }
            }
            self.expect(TokenKind::RParen);
        }

        Some(AttributeNode {
            name,
            arguments,
            position: start,
        })
    }

    fn parse_attribute_argument(&mut self) -> AttributeArgument {
        let start = self.peek_position();

        let save = self.pos;
        let maybe_label = self.expect_ident();
        let labelled = maybe_label.is_some() && *self.peek() == TokenKind::Colon;
        let label = if labelled {
            self.bump();
            maybe_label
        } else {
            self.pos = save;
            None
        };

        let expression = self.parse_expression();

        AttributeArgument {
            label,
            expression,
            position: start,
        }
    }

    /// Parses a single logical expression: one or more conditions joined by
    /// `and`/`or`. Left-associative, no precedence climbing between `and`
    /// and `or` (matches the schema DSL's flat condition lists).
    fn parse_expression(&mut self) -> Option<Expression> {
        let mut expr = Expression::Condition(self.parse_condition()?);

        loop {
            match self.peek().clone() {
                TokenKind::And => {
                    self.bump();
                    let rhs = self.parse_condition()?;
                    expr = Expression::And(Box::new(expr), Box::new(Expression::Condition(rhs)));
                }
                TokenKind::Or => {
                    self.bump();
                    let rhs = self.parse_condition()?;
                    expr = Expression::Or(Box::new(expr), Box::new(Expression::Condition(rhs)));
                }
                _ => break,
            }
        }

        Some(expr)
    }

    fn parse_condition(&mut self) -> Option<Condition> {
        let lhs = self.parse_operand()?;
        let operator_position = self.peek_position();
        let operator = self.parse_operator()?;
        let rhs = self.parse_operand()?;

        Some(Condition {
            lhs,
            operator,
            operator_position,
            rhs,
        })
    }

    fn parse_operator(&mut self) -> Option<Operator> {
        let op = match self.peek().clone() {
            TokenKind::Eq => Operator::Eq,
            TokenKind::NotEq => Operator::NotEq,
            TokenKind::Lt => Operator::Lt,
            TokenKind::LtEq => Operator::LtEq,
            TokenKind::Gt => Operator::Gt,
            TokenKind::GtEq => Operator::GtEq,
            TokenKind::In => Operator::In,
            TokenKind::NotIn => Operator::NotIn,
            TokenKind::Assign => Operator::Assign,
            other => {
                self.error(format!("expected a comparison or assignment operator, found {other:?}"));
                return None;
            }
        };
        self.bump();
        Some(op)
    }

    fn parse_operand(&mut self) -> Option<Operand> {
        let pos = self.peek_position();
        match self.peek().clone() {
            TokenKind::Text(s) => {
                self.bump();
                Some(Operand::Literal(LiteralValue::Text(s), pos))
            }
            TokenKind::Number(n) => {
                self.bump();
                Some(Operand::Literal(LiteralValue::Number(n), pos))
            }
            TokenKind::Bool(b) => {
                self.bump();
                Some(Operand::Literal(LiteralValue::Boolean(b), pos))
            }
            TokenKind::Null => {
                self.bump();
                Some(Operand::Literal(LiteralValue::Null, pos))
            }
            TokenKind::LBracket => {
                self.bump();
                let mut values = Vec::new();
                while *self.peek() != TokenKind::RBracket && !self.at_eof() {
                    match self.parse_operand() {
                        Some(Operand::Literal(v, _)) => values.push(v),
                        Some(Operand::Ident(_)) => {
                            self.error("array literals may only contain literal values");
                        }
                        None => {}
                    }
                    if *self.peek() == TokenKind::Comma {
                        self.bump();
                    }
                }
                self.expect(TokenKind::RBracket);
                Some(Operand::Literal(LiteralValue::Array(values), pos))
            }
            TokenKind::Ident(_) => {
                let mut fragments = Vec::new();
                loop {
                    match self.expect_ident() {
                        Some(ident) => fragments.push(ident),
                        None => break,
                    }
                    if *self.peek() == TokenKind::Dot {
                        self.bump();
                    } else {
                        break;
                    }
                }
                if fragments.is_empty() {
                    None
                } else {
                    Some(Operand::Ident(fragments))
                }
            }
            other => {
                self.error(format!("expected an operand, found {other:?}"));
                None
            }
        }
    }

    fn parse_enum(&mut self) -> Option<EnumNode> {
        let start = self.peek_position();
        self.bump(); // 'enum'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace);
        let mut values = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            if let Some(v) = self.expect_ident() {
                values.push(v);
            } else {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);

        Some(EnumNode {
            name,
            values,
            position: start,
        })
    }

    fn parse_role(&mut self) -> Option<RoleNode> {
        let start = self.peek_position();
        self.bump(); // 'role'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace);
        let mut domains = Vec::new();
        let mut emails = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            match self.peek().clone() {
                TokenKind::Ident(kw) if kw == "domains" => {
                    self.bump();
                    self.expect(TokenKind::LParen);
                    while *self.peek() != TokenKind::RParen && !self.at_eof() {
                        if let TokenKind::Text(s) = self.peek().clone() {
                            self.bump();
                            domains.push(s);
                        } else {
                            self.bump();
                        }
                        if *self.peek() == TokenKind::Comma {
                            self.bump();
                        }
                    }
                    self.expect(TokenKind::RParen);
                }
                TokenKind::Ident(kw) if kw == "emails" => {
                    self.bump();
                    self.expect(TokenKind::LParen);
                    while *self.peek() != TokenKind::RParen && !self.at_eof() {
                        if let TokenKind::Text(s) = self.peek().clone() {
                            self.bump();
                            emails.push(s);
                        } else {
                            self.bump();
                        }
                        if *self.peek() == TokenKind::Comma {
                            self.bump();
                        }
                    }
                    self.expect(TokenKind::RParen);
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.expect(TokenKind::RBrace);

        Some(RoleNode {
            name,
            domains,
            emails,
            position: start,
        })
    }

    fn parse_api(&mut self) -> Option<ApiNode> {
        let start = self.peek_position();
        self.bump(); // 'api'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace);
        let mut models = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            match self.peek().clone() {
                TokenKind::Ident(kw) if kw == "models" => {
                    self.bump();
                    self.expect(TokenKind::LParen);
                    while *self.peek() != TokenKind::RParen && !self.at_eof() {
                        if let Some(m) = self.expect_ident() {
                            models.push(m);
                        }
                        if *self.peek() == TokenKind::Comma {
                            self.bump();
                        }
                    }
                    self.expect(TokenKind::RParen);
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.expect(TokenKind::RBrace);

        Some(ApiNode {
            name,
            models,
            position: start,
        })
    }

    fn parse_message(&mut self) -> Option<MessageNode> {
        let start = self.peek_position();
        self.bump(); // 'message'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace);
        let mut fields = Vec::new();
        while *self.peek() != TokenKind::RBrace && !self.at_eof() {
            if let Some(f) = self.parse_field() {
                fields.push(f);
            } else {
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);

        Some(MessageNode {
            name,
            fields,
            position: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_model() {
        let files = vec![SchemaFile::new(
            "a.keel",
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
        )];
        let (asts, errors) = parse_sources(&files);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(asts.len(), 1);
        let Declaration::Model(model) = &asts[0].declarations[0] else {
            panic!("expected model declaration");
        };
        assert_eq!(model.name.value, "Person");
        assert_eq!(model.fields().len(), 1);
        assert_eq!(model.operations().len(), 1);
    }

    #[test]
    fn parses_where_and_set_attributes() {
        let files = vec![SchemaFile::new(
            "a.keel",
            r#"
            model Post {
                fields {
                    title Text
                    published Boolean
                }
                operations {
                    list listPublished() {
                        @where(post.published == true)
                    }
                }
            }
            "#,
        )];
        let (asts, errors) = parse_sources(&files);
        assert!(errors.is_empty(), "{errors:?}");
        let Declaration::Model(model) = &asts[0].declarations[0] else {
            panic!()
        };
        let action = &model.operations()[0];
        assert_eq!(action.attributes.len(), 1);
        assert_eq!(action.attributes[0].name.value, "where");
    }

    #[test]
    fn malformed_declaration_does_not_panic() {
        let files = vec![SchemaFile::new("a.keel", "model { fields { } }\nmodel Person { fields { name Text } }")];
        let (asts, errors) = parse_sources(&files);
        assert!(!errors.is_empty());
        // The second, well-formed model should still be recovered.
        let models: Vec<_> = asts[0]
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Model(m) => Some(m),
                _ => None,
            })
            .collect();
        assert!(models.iter().any(|m| m.name.value == "Person"));
    }
}
