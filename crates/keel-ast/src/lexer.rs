use crate::position::Position;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{position}: {message}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

/// Tokenizes a single schema file. Never panics: any malformed input produces
/// a `LexError` and scanning resumes at the next character so that the rest
/// of the file (and any sibling files) can still be lexed.
pub struct Lexer<'a> {
    filename: &'static str,
    chars: Vec<char>,
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(filename: &'static str, source: &'a str) -> Self {
        Self {
            filename,
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.here();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, start));
                break;
            };

            let kind = match c {
                '{' => self.advance_with(TokenKind::LBrace),
                '}' => self.advance_with(TokenKind::RBrace),
                '(' => self.advance_with(TokenKind::LParen),
                ')' => self.advance_with(TokenKind::RParen),
                '[' => self.advance_with(TokenKind::LBracket),
                ']' => self.advance_with(TokenKind::RBracket),
                ',' => self.advance_with(TokenKind::Comma),
                '.' => self.advance_with(TokenKind::Dot),
                '@' => self.advance_with(TokenKind::At),
                ':' => self.advance_with(TokenKind::Colon),
                '?' => self.advance_with(TokenKind::Question),
                '=' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::NotEq
                    } else {
                        TokenKind::Bang
                    }
                }
                '<' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::LtEq
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::GtEq
                    } else {
                        TokenKind::Gt
                    }
                }
                '"' => self.lex_string(),
                c if c.is_ascii_digit() => self.lex_number(),
                c if c.is_alphabetic() || c == '_' => self.lex_ident_or_keyword(),
                other => {
                    self.errors.push(LexError {
                        message: format!("unexpected character '{other}'"),
                        position: start,
                    });
                    self.bump();
                    continue;
                }
            };

            tokens.push(Token::new(kind, start));
        }

        (tokens, self.errors)
    }

    fn here(&self) -> Position {
        Position::new(self.filename, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_with(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self) -> TokenKind {
        let start = self.here();
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.errors.push(LexError {
                        message: "unterminated string literal".to_string(),
                        position: start,
                    });
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::Text(value)
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                raw.push(c);
                self.bump();
            } else {
                break;
            }
        }
        raw.parse::<f64>().map(TokenKind::Number).unwrap_or_else(|_| {
            self.errors.push(LexError {
                message: format!("invalid number literal '{raw}'"),
                position: self.here(),
            });
            TokenKind::Number(0.0)
        })
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                raw.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match raw.as_str() {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "in" => TokenKind::In,
            "notIn" => TokenKind::NotIn,
            _ => TokenKind::Ident(raw),
        }
    }
}

/// Convenience wrapper that also accepts an already-borrowed source string,
/// for callers that don't need to retain the `Lexer` itself.
pub fn tokenize(filename: &'static str, source: &str) -> (Vec<Token>, Vec<LexError>) {
    Lexer::new(filename, source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_model_skeleton() {
        let (tokens, errors) = tokenize("a.keel", "model Person {\n  fields {\n    name Text\n  }\n}");
        assert!(errors.is_empty());
        assert!(matches!(tokens[0].kind, TokenKind::Ident(ref s) if s == "model"));
    }

    #[test]
    fn unterminated_string_reported_not_panicking() {
        let (_, errors) = tokenize("a.keel", "@where(x == \"abc)");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn comparison_operators() {
        let (tokens, errors) = tokenize("a.keel", "== != <= >= < >");
        assert!(errors.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Eq,
                &TokenKind::NotEq,
                &TokenKind::LtEq,
                &TokenKind::GtEq,
                &TokenKind::Lt,
                &TokenKind::Gt,
                &TokenKind::Eof,
            ]
        );
    }
}
