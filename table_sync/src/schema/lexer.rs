//! Tokenizer and line grammar for schema-definition text
//!
//! Each line of a definition block holds at most one chained call:
//!
//! ```text
//! line      := [variable "->"] call ("->" call)* [";"]
//! call      := ident "(" [arg ("," arg)*] ")"
//! arg       := string | number | true | false | null | "[" [arg ("," arg)*] "]"
//!            | ident "::" ident "(" args ")" | ident
//! ```
//!
//! Lines that do not fit the grammar are kept as [`Line::Unparsed`].

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Variable(String),
    Str(String),
    Number(String),
    Arrow,
    DoubleColon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Other(char),
}

/// Call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Number(String),
    Bool(bool),
    Null,
    List(Vec<Arg>),
    /// Raw expression such as `DB::raw('CURRENT_TIMESTAMP')` or a bare constant
    Raw(String),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Arg::Number(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Flatten a string or list of strings
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Arg::Str(value) => Some(vec![value.clone()]),
            Arg::List(items) => items.iter().map(|i| i.as_str().map(str::to_string)).collect(),
            _ => None,
        }
    }
}

/// A single `name(args)` call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

/// A construct followed by its modifier chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainCall {
    pub construct: String,
    /// First argument when it is a plain string (usually the column name)
    pub name: Option<String>,
    pub positional_args: Vec<Arg>,
    pub modifiers: Vec<Call>,
}

impl ChainCall {
    pub fn modifier(&self, name: &str) -> Option<&Call> {
        self.modifiers.iter().find(|m| m.name == name)
    }
}

/// One line of a definition block
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Statement { number: usize, call: ChainCall },
    Unparsed { number: usize, text: String },
}

/// Tokenize a single line; comments end the line
pub fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => break,
            '/' => {
                chars.next();
                match chars.peek() {
                    Some('/') => break,
                    Some('*') => {
                        chars.next();
                        if !skip_block_comment(&mut chars) {
                            break;
                        }
                    }
                    _ => tokens.push(Token::Other('/')),
                }
            }
            '$' => {
                chars.next();
                tokens.push(Token::Variable(read_ident(&mut chars)));
            }
            '\'' | '"' => {
                chars.next();
                tokens.push(Token::Str(read_string(&mut chars, c)?));
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Arrow);
                    }
                    Some(d) if d.is_ascii_digit() => {
                        tokens.push(Token::Number(format!("-{}", read_number(&mut chars))));
                    }
                    _ => tokens.push(Token::Other('-')),
                }
            }
            ':' => {
                chars.next();
                if chars.peek() == Some(&':') {
                    chars.next();
                    tokens.push(Token::DoubleColon);
                } else {
                    tokens.push(Token::Other(':'));
                }
            }
            c if c.is_ascii_digit() => tokens.push(Token::Number(read_number(&mut chars))),
            c if c.is_alphabetic() || c == '_' || c == '\\' => tokens.push(Token::Ident(read_ident(&mut chars))),
            _ => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    ';' => Token::Semicolon,
                    other => Token::Other(other),
                });
            }
        }
    }

    Ok(tokens)
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) -> bool {
    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return true;
        }
    }
    false
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '\\' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut number = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' || c == '_' {
            if c != '_' {
                number.push(c);
            }
            chars.next();
        } else {
            break;
        }
    }
    number
}

fn read_string(chars: &mut Peekable<Chars<'_>>, quote: char) -> Result<String, String> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if next == quote || next == '\\' => value.push(next),
                Some(next) => {
                    value.push('\\');
                    value.push(next);
                }
                None => break,
            },
            c if c == quote => return Ok(value),
            c => value.push(c),
        }
    }
    Err(format!("unterminated string starting with {}", quote))
}

/// Cursor over a token stream
struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(format!("expected {:?}, found {:?}", expected, other)),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Parse one line; `None` for blank and comment-only lines
pub fn parse_line(number: usize, text: &str) -> Option<Line> {
    match tokenize(text) {
        Ok(tokens) if tokens.is_empty() => None,
        tokens => Some(line_from_tokens(number, text.trim().to_string(), tokens)),
    }
}

fn line_from_tokens(number: usize, text: String, tokens: Result<Vec<Token>, String>) -> Line {
    match tokens.and_then(|tokens| parse_chain(Cursor { tokens, pos: 0 })) {
        Ok(call) => Line::Statement { number, call },
        Err(_) => Line::Unparsed { number, text },
    }
}

/// Parse every statement of a block body
///
/// A line starting with `->` continues the previous statement. The joined
/// chain is parsed as one unit, so a chain that cannot be read whole is
/// reported as unparsed instead of being partly applied.
pub fn parse_lines(body: &str) -> Vec<Line> {
    let mut statements: Vec<(usize, String, Result<Vec<Token>, String>)> = Vec::new();

    for (index, text) in body.lines().enumerate() {
        let tokens = tokenize(text);
        if matches!(&tokens, Ok(tokens) if tokens.is_empty()) {
            continue;
        }
        if text.trim_start().starts_with("->") {
            if let Some((_, joined, pending)) = statements.last_mut() {
                joined.push(' ');
                joined.push_str(text.trim());
                match (pending, tokens) {
                    (Ok(head), Ok(tail)) => head.extend(tail),
                    (pending, _) => *pending = Err(format!("unreadable continuation on line {}", index + 1)),
                }
                continue;
            }
        }
        statements.push((index + 1, text.trim().to_string(), tokens));
    }

    statements
        .into_iter()
        .map(|(number, text, tokens)| line_from_tokens(number, text, tokens))
        .collect()
}

fn parse_chain(mut cursor: Cursor) -> Result<ChainCall, String> {
    if let Some(Token::Variable(_)) = cursor.peek() {
        cursor.next();
        cursor.expect(&Token::Arrow)?;
    }

    let first = parse_call(&mut cursor)?;
    let mut modifiers = Vec::new();
    while cursor.peek() == Some(&Token::Arrow) {
        cursor.next();
        modifiers.push(parse_call(&mut cursor)?);
    }

    if cursor.peek() == Some(&Token::Semicolon) {
        cursor.next();
    }
    if !cursor.at_end() {
        return Err(format!("unexpected trailing token {:?}", cursor.peek()));
    }

    let mut args = first.args.into_iter();
    let (name, positional_args) = match args.next() {
        Some(Arg::Str(name)) => (Some(name), args.collect()),
        Some(other) => (None, std::iter::once(other).chain(args).collect()),
        None => (None, Vec::new()),
    };

    Ok(ChainCall {
        construct: first.name,
        name,
        positional_args,
        modifiers,
    })
}

fn parse_call(cursor: &mut Cursor) -> Result<Call, String> {
    let name = match cursor.next() {
        Some(Token::Ident(name)) => name,
        other => return Err(format!("expected identifier, found {:?}", other)),
    };
    cursor.expect(&Token::LParen)?;
    let args = parse_args(cursor, &Token::RParen)?;
    Ok(Call { name, args })
}

fn parse_args(cursor: &mut Cursor, close: &Token) -> Result<Vec<Arg>, String> {
    let mut args = Vec::new();
    if cursor.peek() == Some(close) {
        cursor.next();
        return Ok(args);
    }
    loop {
        args.push(parse_arg(cursor)?);
        match cursor.next() {
            Some(Token::Comma) if cursor.peek() == Some(close) => {
                cursor.next();
                return Ok(args);
            }
            Some(Token::Comma) => continue,
            Some(ref token) if token == close => return Ok(args),
            other => return Err(format!("expected ',' or {:?}, found {:?}", close, other)),
        }
    }
}

fn parse_arg(cursor: &mut Cursor) -> Result<Arg, String> {
    match cursor.next() {
        Some(Token::Str(value)) => Ok(Arg::Str(value)),
        Some(Token::Number(value)) => Ok(Arg::Number(value)),
        Some(Token::LBracket) => Ok(Arg::List(parse_args(cursor, &Token::RBracket)?)),
        Some(Token::Ident(ident)) => match ident.to_lowercase().as_str() {
            "true" => Ok(Arg::Bool(true)),
            "false" => Ok(Arg::Bool(false)),
            "null" => Ok(Arg::Null),
            _ if cursor.peek() == Some(&Token::DoubleColon) => {
                cursor.next();
                let call = parse_call(cursor)?;
                let raw = call
                    .args
                    .first()
                    .and_then(|a| a.as_str().map(str::to_string))
                    .unwrap_or_else(|| format!("{}::{}", ident, call.name));
                Ok(Arg::Raw(raw))
            }
            _ if cursor.peek_at(0) == Some(&Token::LParen) => {
                let call_name = ident.clone();
                cursor.next();
                parse_args(cursor, &Token::RParen)?;
                Ok(Arg::Raw(format!("{}()", call_name)))
            }
            _ => Ok(Arg::Raw(ident)),
        },
        other => Err(format!("unexpected argument token {:?}", other)),
    }
}
