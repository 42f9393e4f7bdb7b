//! Boolean rule expressions.
//!
//! Rules written as strings in the rule table are parsed once, at start-up,
//! into a closed AST and evaluated against a fixed scope of `user`, `data` and
//! `newData`. Nothing is evaluated dynamically.
//!
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | primary
//! primary := "(" expr ")" | "isOwner" "(" "user" "," "data" ")" | operand [cmp operand]
//! cmp     := "==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">="
//! operand := ("user" | "data" | "newData") ("." field)* | literal
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Number, Value};

use super::RuleError;
use crate::store::loose_eq;

/// Root variable a path starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    User,
    Data,
    NewData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Loose equality
    Eq,
    Ne,
    /// Strict equality, no coercion
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Root, Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    /// `user._id == data._ownerId`
    IsOwner,
}

/// Values a rule expression can see.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub user: Option<&'a Value>,
    pub data: Option<&'a Value>,
    pub new_data: Option<&'a Value>,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, RuleError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            source,
        };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluate to a boolean using JSON truthiness.
    pub fn test(&self, scope: &Scope<'_>) -> bool {
        truthy(&self.eval(scope))
    }

    pub fn eval(&self, scope: &Scope<'_>) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Path(root, fields) => {
                let start = match root {
                    Root::User => scope.user,
                    Root::Data => scope.data,
                    Root::NewData => scope.new_data,
                };
                fields
                    .iter()
                    .fold(start, |current, field| current.and_then(|v| v.get(field)))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Expr::Not(inner) => Value::Bool(!inner.test(scope)),
            Expr::And(left, right) => Value::Bool(left.test(scope) && right.test(scope)),
            Expr::Or(left, right) => Value::Bool(left.test(scope) || right.test(scope)),
            Expr::Compare(op, left, right) => {
                Value::Bool(compare(*op, &left.eval(scope), &right.eval(scope)))
            }
            Expr::IsOwner => {
                let user_id = scope.user.and_then(|u| u.get("_id"));
                let owner_id = scope.data.and_then(|d| d.get("_ownerId"));
                Value::Bool(matches!((user_id, owner_id), (Some(a), Some(b)) if loose_eq(a, b)))
            }
        }
    }
}

/// Truthiness of a JSON value: `null`, `false`, `0`, `NaN` and `""` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(left, right),
        CmpOp::Ne => !loose_eq(left, right),
        CmpOp::StrictEq => strict_eq(left, right),
        CmpOp::StrictNe => !strict_eq(left, right),
        CmpOp::Lt => order(left, right) == Some(Ordering::Less),
        CmpOp::Le => matches!(order(left, right), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => order(left, right) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(order(left, right), Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Ordering between two values of the same primitive kind.
pub(crate) fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Root::User => "user",
            Root::Data => "data",
            Root::NewData => "newData",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Dot,
    Comma,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Cmp(CmpOp),
}

fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |message: String| RuleError::Syntax {
        expr: source.to_string(),
        message,
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let after = chars.get(i + 2).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                if after == Some('=') {
                    tokens.push(Token::Cmp(CmpOp::StrictEq));
                    i += 3;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Eq));
                    i += 2;
                }
            }
            '!' if next == Some('=') => {
                if after == Some('=') {
                    tokens.push(Token::Cmp(CmpOp::StrictNe));
                    i += 3;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Ne));
                    i += 2;
                }
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    (_, true) => CmpOp::Ge,
                    (_, false) => CmpOp::Gt,
                };
                tokens.push(Token::Cmp(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax("unterminated string literal".into())),
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| syntax("unterminated string literal".into()))?;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => *other,
                            });
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit() || c == '.' || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .ok()
                    .and_then(number_value)
                    .ok_or_else(|| syntax(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Literal(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" | "undefined" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(syntax(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

fn number_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'s> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'s str,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> RuleError {
        RuleError::Syntax {
            expr: self.source.to_string(),
            message: format!("{} at token {}", message, self.pos),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), RuleError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn or(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        if self.eat(&Token::LParen) {
            let inner = self.or()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }

        if self.peek() == Some(&Token::Ident("isOwner".into())) {
            self.pos += 1;
            self.expect(&Token::LParen, "'(' after isOwner")?;
            self.expect(&Token::Ident("user".into()), "'user'")?;
            self.expect(&Token::Comma, "','")?;
            self.expect(&Token::Ident("data".into()), "'data'")?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(Expr::IsOwner);
        }

        let left = self.operand()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn operand(&mut self) -> Result<Expr, RuleError> {
        match self.peek().cloned() {
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Token::Ident(name)) => {
                let root = match name.as_str() {
                    "user" => Root::User,
                    "data" => Root::Data,
                    "newData" => Root::NewData,
                    _ => return Err(self.error(&format!("unknown variable '{}'", name))),
                };
                self.pos += 1;
                let mut fields = Vec::new();
                while self.eat(&Token::Dot) {
                    match self.peek().cloned() {
                        Some(Token::Ident(field)) => {
                            fields.push(field);
                            self.pos += 1;
                        }
                        _ => return Err(self.error("expected field name after '.'")),
                    }
                }
                Ok(Expr::Path(root, fields))
            }
            _ => Err(self.error("expected a value")),
        }
    }
}
