//! Restricted expression language for `transform` nodes.
//!
//! Expressions reshape a JSON-like value. `input` is the only name in scope
//! and there is no access to anything outside the value being transformed.
//!
//! Supported:
//! - `input`, literals (numbers, quoted strings, `true`, `false`, `null`)
//! - field access `input.a.b` and indexing `input.items[0]`, `input["a b"]`
//! - object literals with spread: `{ ...input, added: 123, "x y": input.a }`
//! - array literals with spread: `[...input.items, 4]`
//! - null coalescing `input.name ?? "anonymous"`
//! - parentheses
//!
//! Missing keys and out-of-range indices evaluate to `null`, as does any
//! access on `null`. Access on other scalars is an error, and so is
//! spreading anything but an object into an object or an array into an
//! array. Trees deeper than [`MAX_DEPTH`] are rejected at parse time.

use flowcore::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Deepest expression tree the parser accepts
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("{0}")]
    Runtime(String),
}

/// A parsed expression, ready to be evaluated against many inputs
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.parse_expr()?;
        if let Some((token, offset)) = parser.peek_with_offset() {
            return Err(ExprError::Syntax {
                offset,
                message: format!("unexpected {}", token.describe()),
            });
        }
        Ok(Self { root })
    }

    pub fn evaluate(&self, input: &Value) -> Result<Value, ExprError> {
        eval(&self.root, input)
    }
}

/// Parse and evaluate in one step
pub fn evaluate(source: &str, input: &Value) -> Result<Value, ExprError> {
    Expression::parse(source)?.evaluate(input)
}

/// Follow a dotted path (`a.b.0`) through objects and arrays.
///
/// Any segment that cannot be followed yields `null`.
pub fn lookup_path(value: &Value, path: &str) -> Value {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Input,
    Literal(Value),
    Object(Vec<Member>),
    Array(Vec<Item>),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn height(&self) -> usize {
        match self {
            Expr::Input | Expr::Literal(_) => 1,
            Expr::Field(base, _) => base.height() + 1,
            Expr::Index(a, b) | Expr::Coalesce(a, b) => a.height().max(b.height()) + 1,
            Expr::Object(members) => {
                1 + members
                    .iter()
                    .map(|m| match m {
                        Member::Spread(e) | Member::Field(_, e) => e.height(),
                    })
                    .max()
                    .unwrap_or(0)
            }
            Expr::Array(items) => {
                1 + items
                    .iter()
                    .map(|i| match i {
                        Item::Spread(e) | Item::Single(e) => e.height(),
                    })
                    .max()
                    .unwrap_or(0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Member {
    Spread(Expr),
    Field(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Spread(Expr),
    Single(Expr),
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Ellipsis,
    Coalesce,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Num(n) => format!("number {}", n),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBrace => "'{'".into(),
            Token::RBrace => "'}'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::Comma => "','".into(),
            Token::Colon => "':'".into(),
            Token::Dot => "'.'".into(),
            Token::Ellipsis => "'...'".into(),
            Token::Coalesce => "'??'".into(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |offset: usize, message: String| ExprError::Syntax { offset, message };
    let peek = |idx: usize| chars.get(idx).map(|&(_, c)| c);

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, offset));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, offset));
                i += 1;
            }
            '{' => {
                tokens.push((Token::LBrace, offset));
                i += 1;
            }
            '}' => {
                tokens.push((Token::RBrace, offset));
                i += 1;
            }
            '[' => {
                tokens.push((Token::LBracket, offset));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, offset));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, offset));
                i += 1;
            }
            ':' => {
                tokens.push((Token::Colon, offset));
                i += 1;
            }
            '.' if peek(i + 1) == Some('.') && peek(i + 2) == Some('.') => {
                tokens.push((Token::Ellipsis, offset));
                i += 3;
            }
            '.' => {
                tokens.push((Token::Dot, offset));
                i += 1;
            }
            '?' if peek(i + 1) == Some('?') => {
                tokens.push((Token::Coalesce, offset));
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match peek(i) {
                        None => return Err(syntax(offset, "unterminated string literal".into())),
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match peek(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some('\\') => '\\',
                                Some('/') => '/',
                                Some('"') => '"',
                                Some('\'') => '\'',
                                Some(other) => {
                                    return Err(syntax(
                                        chars[i].0,
                                        format!("unknown escape '\\{}'", other),
                                    ))
                                }
                                None => {
                                    return Err(syntax(offset, "unterminated string literal".into()))
                                }
                            };
                            text.push(escaped);
                            i += 2;
                        }
                        Some(ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(text), offset));
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while let Some(ch) = peek(i) {
                    let exponent_sign = (ch == '-' || ch == '+')
                        && matches!(peek(i.wrapping_sub(1)), Some('e') | Some('E'));
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                        // `1...` is never a number followed by a spread
                        if ch == '.' && peek(i + 1) == Some('.') {
                            break;
                        }
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                let num: f64 = text
                    .parse()
                    .map_err(|_| syntax(offset, format!("invalid number '{}'", text)))?;
                tokens.push((Token::Num(num), offset));
            }
            c if is_ident_start(c) => {
                let start = i;
                while peek(i).is_some_and(is_ident_char) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                tokens.push((Token::Ident(ident), offset));
            }
            other => {
                return Err(syntax(offset, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    /// Nesting of `parse_expr` calls currently on the stack
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_offset(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, o)| (t, *o))
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Undo the last `next()` so errors point at the offending token
    fn step_back(&mut self, consumed: bool) {
        if consumed {
            self.pos -= 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Syntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn check_height(&self, height: usize) -> Result<(), ExprError> {
        if height > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.peek() {
            Some(t) if *t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                t.describe()
            ))),
            None => Err(self.error(format!(
                "expected {}, found end of expression",
                expected.describe()
            ))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let parsed = self.parse_coalesce();
        self.depth -= 1;
        parsed
    }

    fn parse_coalesce(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_postfix()?;
        let mut height = left.height();
        while self.peek() == Some(&Token::Coalesce) {
            self.pos += 1;
            let right = self.parse_postfix()?;
            height = height.max(right.height()) + 1;
            self.check_height(height)?;
            left = Expr::Coalesce(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        let mut height = expr.height();
        self.check_height(height)?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            height += 1;
                            self.check_height(height)?;
                            expr = Expr::Field(Box::new(expr), name);
                        }
                        _ => return Err(self.error("expected field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    height = height.max(index.height()) + 1;
                    self.check_height(height)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Ident(name)) => match name.as_str() {
                "input" => Ok(Expr::Input),
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                other => Err(ExprError::Syntax {
                    offset,
                    message: format!("unknown identifier '{}', only 'input' is in scope", other),
                }),
            },
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBrace) => self.parse_object(),
            Some(Token::LBracket) => self.parse_array(),
            Some(other) => Err(ExprError::Syntax {
                offset,
                message: format!("unexpected {}", other.describe()),
            }),
            None => Err(ExprError::Syntax {
                offset,
                message: "unexpected end of expression".into(),
            }),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        let mut members = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.pos += 1;
                break;
            }

            let member = match self.next() {
                Some(Token::Ellipsis) => Member::Spread(self.parse_expr()?),
                Some(Token::Ident(key)) | Some(Token::Str(key)) => {
                    if self.peek() == Some(&Token::Colon) {
                        self.pos += 1;
                        Member::Field(key, self.parse_expr()?)
                    } else if key == "input" {
                        Member::Field(key, Expr::Input)
                    } else {
                        return Err(self.error(format!("expected ':' after key '{}'", key)));
                    }
                }
                other => {
                    self.step_back(other.is_some());
                    return Err(self.error("expected object key, '...' or '}'"));
                }
            };
            members.push(member);

            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => break,
                other => {
                    self.step_back(other.is_some());
                    return Err(self.error("expected ',' or '}' in object literal"));
                }
            }
        }
        Ok(Expr::Object(members))
    }

    fn parse_array(&mut self) -> Result<Expr, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBracket) {
                self.pos += 1;
                break;
            }

            let item = if self.peek() == Some(&Token::Ellipsis) {
                self.pos += 1;
                Item::Spread(self.parse_expr()?)
            } else {
                Item::Single(self.parse_expr()?)
            };
            items.push(item);

            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => {
                    self.step_back(other.is_some());
                    return Err(self.error("expected ',' or ']' in array literal"));
                }
            }
        }
        Ok(Expr::Array(items))
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

fn eval(expr: &Expr, input: &Value) -> Result<Value, ExprError> {
    match expr {
        Expr::Input => Ok(input.clone()),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Field(base, name) => field(&eval(base, input)?, name),
        Expr::Index(base, index) => {
            let base = eval(base, input)?;
            match eval(index, input)? {
                Value::String(name) => field(&base, &name),
                Value::Number(n) => element(&base, n),
                other => Err(ExprError::Runtime(format!(
                    "cannot index with a {}",
                    other.type_name()
                ))),
            }
        }
        Expr::Coalesce(left, right) => match eval(left, input)? {
            Value::Null => eval(right, input),
            v => Ok(v),
        },
        Expr::Object(members) => {
            let mut map = BTreeMap::new();
            for member in members {
                match member {
                    Member::Field(key, value) => {
                        map.insert(key.clone(), eval(value, input)?);
                    }
                    Member::Spread(source) => match eval(source, input)? {
                        Value::Object(fields) => map.extend(fields),
                        other => {
                            return Err(ExprError::Runtime(format!(
                                "cannot spread a {} into an object",
                                other.type_name()
                            )))
                        }
                    },
                }
            }
            Ok(Value::Object(map))
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Item::Single(value) => out.push(eval(value, input)?),
                    Item::Spread(source) => match eval(source, input)? {
                        Value::Array(values) => out.extend(values),
                        other => {
                            return Err(ExprError::Runtime(format!(
                                "cannot spread a {} into an array",
                                other.type_name()
                            )))
                        }
                    },
                }
            }
            Ok(Value::Array(out))
        }
    }
}

fn field(base: &Value, name: &str) -> Result<Value, ExprError> {
    match base {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
        Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(ExprError::Runtime(format!(
            "cannot read field '{}' of a {}",
            name,
            other.type_name()
        ))),
    }
}

fn element(base: &Value, index: f64) -> Result<Value, ExprError> {
    match base {
        Value::Array(items) => {
            if index < 0.0 || index.fract() != 0.0 {
                return Ok(Value::Null);
            }
            Ok(items.get(index as usize).cloned().unwrap_or(Value::Null))
        }
        Value::Object(map) => Ok(map.get(&index.to_string()).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(ExprError::Runtime(format!(
            "cannot index into a {}",
            other.type_name()
        ))),
    }
}
