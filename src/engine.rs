//! Evaluation engine contract consumed by the console and the agent, plus a
//! small built-in statement evaluator so the binary has something to run.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::render::Value;

/// Outcome of submitting one accumulated input buffer.
#[derive(Debug, Default)]
pub struct Submission {
    /// Non-`None` means the statement is incomplete: keep this text, append
    /// the next line, and resubmit.
    pub remaining: Option<String>,
    /// `None` means no value was produced. `Some(Value::Null)` is a produced
    /// null, which still renders.
    pub result: Option<Value>,
    /// Diagnostics captured during this call only, never shared across turns.
    pub diagnostics: String,
    /// An explicit quit was observed.
    pub quit: bool,
}

impl Submission {
    pub fn incomplete(remaining: impl Into<String>) -> Self {
        Self {
            remaining: Some(remaining.into()),
            ..Self::default()
        }
    }

    pub fn value(value: Value) -> Self {
        Self {
            result: Some(value),
            ..Self::default()
        }
    }

    pub fn no_value() -> Self {
        Self::default()
    }
}

/// Cooperative cancellation request, safe to trigger from another thread
/// while `submit` is running. It only raises a flag the engine checks at its
/// own checkpoints; it never terminates execution.
#[derive(Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consumes a pending request, if any.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

pub trait Engine: Send {
    /// Evaluates the accumulated input for one turn. Diagnostics go into the
    /// returned `Submission`, not onto any shared stream.
    fn submit(&mut self, input: &str) -> Submission;

    /// Handle for cooperative cancellation of an in-progress `submit`.
    fn interrupt_handle(&self) -> InterruptHandle;
}

const SLEEP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Built-in evaluator: integer arithmetic, string/char/bool/null and sequence
/// literals, `let` bindings, a `sleep(ms)` builtin with interrupt checkpoints,
/// and brace/quote balance for multi-line statement detection.
pub struct BlockEngine {
    variables: HashMap<String, Value>,
    interrupt: InterruptHandle,
}

impl Default for BlockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockEngine {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            interrupt: InterruptHandle::default(),
        }
    }
}

impl Engine for BlockEngine {
    fn submit(&mut self, input: &str) -> Submission {
        // A request left over from a previous turn must not cancel this one.
        self.interrupt.take();

        if !is_balanced(input) {
            return Submission::incomplete(input);
        }

        let trimmed = input.trim();
        if trimmed == "quit" || trimmed == "quit;" {
            return Submission {
                quit: true,
                ..Submission::default()
            };
        }
        if trimmed.is_empty() {
            return Submission::no_value();
        }

        match evaluate_statement(trimmed, &mut self.variables, &self.interrupt) {
            Ok(result) => Submission {
                result,
                ..Submission::default()
            },
            Err(message) => Submission {
                diagnostics: message,
                ..Submission::default()
            },
        }
    }

    fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }
}

/// Lexical balance check: a statement is complete once every brace, bracket,
/// parenthesis, and quote opened in it has been closed.
fn is_balanced(input: &str) -> bool {
    let mut depth = 0i64;
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            '"' | '\'' => {
                let quote = ch;
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        let _ = chars.next();
                    } else if inner == quote {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth <= 0
}

fn evaluate_statement(
    input: &str,
    variables: &mut HashMap<String, Value>,
    interrupt: &InterruptHandle,
) -> Result<Option<Value>, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        interrupt,
    };

    if parser.peek_keyword("let") {
        parser.advance();
        let name = parser.expect_ident()?;
        parser.expect_punct('=')?;
        let value = parser
            .expression(variables)?
            .ok_or_else(|| "error: expression produced no value".to_string())?;
        parser.expect_punct(';')?;
        parser.expect_end()?;
        variables.insert(name, value);
        return Ok(None);
    }

    let value = parser.expression(variables)?;
    let discard = parser.eat_punct(';');
    parser.expect_end()?;
    if discard { Ok(None) } else { Ok(value) }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Char(char),
    Ident(String),
    Punct(char),
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ch if ch.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&digit) = chars.peek() {
                    if !digit.is_ascii_digit() {
                        break;
                    }
                    digits.push(digit);
                    chars.next();
                }
                let value = digits
                    .parse()
                    .map_err(|_| format!("error: integer literal out of range: {digits}"))?;
                tokens.push(Token::Int(value));
            }
            ch if ch.is_alphabetic() || ch == '_' => {
                let mut ident = String::new();
                while let Some(&part) = chars.peek() {
                    if !part.is_alphanumeric() && part != '_' {
                        break;
                    }
                    ident.push(part);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => return Err("error: unterminated string literal".to_string()),
                        },
                        Some('"') => break,
                        Some(other) => text.push(other),
                        None => return Err("error: unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '\'' => {
                chars.next();
                let value = match chars.next() {
                    Some('\\') => match chars.next() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(other) => other,
                        None => return Err("error: unterminated character literal".to_string()),
                    },
                    Some(other) => other,
                    None => return Err("error: unterminated character literal".to_string()),
                };
                if chars.next() != Some('\'') {
                    return Err("error: unterminated character literal".to_string());
                }
                tokens.push(Token::Char(value));
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | '[' | ']' | ',' | ';' | '=' => {
                tokens.push(Token::Punct(ch));
                chars.next();
            }
            other => return Err(format!("error: unexpected character: {other}")),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    interrupt: &'a InterruptHandle,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if matches!(self.peek(), Some(Token::Punct(found)) if *found == punct) {
            self.position += 1;
            return true;
        }
        false
    }

    fn expect_punct(&mut self, punct: char) -> Result<(), String> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(format!("error: expected `{punct}`"))
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err("error: expected an identifier".to_string()),
        }
    }

    fn expect_end(&mut self) -> Result<(), String> {
        if self.peek().is_none() {
            Ok(())
        } else {
            Err("error: unexpected trailing input".to_string())
        }
    }

    fn expression(&mut self, variables: &HashMap<String, Value>) -> Result<Option<Value>, String> {
        let mut left = self.term(variables)?;
        loop {
            let operator = match self.peek() {
                Some(Token::Punct(op @ ('+' | '-'))) => *op,
                _ => break,
            };
            self.advance();
            let right = self.term(variables)?;
            left = Some(apply_binary(operator, require(left)?, require(right)?)?);
        }
        Ok(left)
    }

    fn term(&mut self, variables: &HashMap<String, Value>) -> Result<Option<Value>, String> {
        let mut left = self.unary(variables)?;
        loop {
            let operator = match self.peek() {
                Some(Token::Punct(op @ ('*' | '/' | '%'))) => *op,
                _ => break,
            };
            self.advance();
            let right = self.unary(variables)?;
            left = Some(apply_binary(operator, require(left)?, require(right)?)?);
        }
        Ok(left)
    }

    fn unary(&mut self, variables: &HashMap<String, Value>) -> Result<Option<Value>, String> {
        if self.eat_punct('-') {
            let value = require(self.unary(variables)?)?;
            return match value {
                Value::Int(number) => Ok(Some(Value::Int(-number))),
                other => Err(format!(
                    "error: cannot negate {}",
                    crate::render::render(&other)
                )),
            };
        }
        self.atom(variables)
    }

    fn atom(&mut self, variables: &HashMap<String, Value>) -> Result<Option<Value>, String> {
        match self.advance() {
            Some(Token::Int(number)) => Ok(Some(Value::Int(number))),
            Some(Token::Str(text)) => Ok(Some(Value::Text(text))),
            Some(Token::Char(ch)) => Ok(Some(Value::Char(ch))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Some(Value::Bool(true))),
                "false" => Ok(Some(Value::Bool(false))),
                "null" => Ok(Some(Value::Null)),
                "sleep" => {
                    self.expect_punct('(')?;
                    let millis = match require(self.expression(variables)?)? {
                        Value::Int(number) if number >= 0 => number as u64,
                        other => {
                            return Err(format!(
                                "error: sleep expects a non-negative integer, got {}",
                                crate::render::render(&other)
                            ));
                        }
                    };
                    self.expect_punct(')')?;
                    self.sleep(millis)?;
                    Ok(None)
                }
                _ => match variables.get(&name) {
                    Some(value) => Ok(Some(value.clone())),
                    None => Err(format!("error: unknown identifier: {name}")),
                },
            },
            Some(Token::Punct('(')) => {
                let value = self.expression(variables)?;
                self.expect_punct(')')?;
                Ok(value)
            }
            Some(Token::Punct('[')) => {
                let mut items = Vec::new();
                if !self.eat_punct(']') {
                    loop {
                        items.push(require(self.expression(variables)?)?);
                        if self.eat_punct(']') {
                            break;
                        }
                        self.expect_punct(',')?;
                    }
                }
                Ok(Some(Value::Seq(items)))
            }
            Some(token) => Err(format!("error: unexpected token: {token:?}")),
            None => Err("error: unexpected end of input".to_string()),
        }
    }

    /// Interrupt checkpoint: sleeps in short slices, abandoning the wait as
    /// soon as a cancellation request is observed.
    fn sleep(&self, millis: u64) -> Result<(), String> {
        let deadline = Instant::now() + Duration::from_millis(millis);
        while Instant::now() < deadline {
            if self.interrupt.take() {
                return Err("error: interrupted".to_string());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(remaining.min(SLEEP_POLL_INTERVAL));
        }
        if self.interrupt.take() {
            return Err("error: interrupted".to_string());
        }
        Ok(())
    }
}

fn require(value: Option<Value>) -> Result<Value, String> {
    value.ok_or_else(|| "error: expression produced no value".to_string())
}

fn apply_binary(operator: char, left: Value, right: Value) -> Result<Value, String> {
    match (operator, left, right) {
        ('+', Value::Text(left), Value::Text(right)) => Ok(Value::Text(left + &right)),
        (op, Value::Int(left), Value::Int(right)) => match op {
            '+' => Ok(Value::Int(left.wrapping_add(right))),
            '-' => Ok(Value::Int(left.wrapping_sub(right))),
            '*' => Ok(Value::Int(left.wrapping_mul(right))),
            '/' if right == 0 => Err("error: division by zero".to_string()),
            '/' => Ok(Value::Int(left / right)),
            '%' if right == 0 => Err("error: division by zero".to_string()),
            '%' => Ok(Value::Int(left % right)),
            _ => Err(format!("error: unsupported operator: {op}")),
        },
        (op, left, right) => Err(format!(
            "error: cannot apply `{op}` to {} and {}",
            crate::render::render(&left),
            crate::render::render(&right)
        )),
    }
}
