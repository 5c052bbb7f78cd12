//! Formula ratings.
//!
//! The dependent value is computed from the independent values by an
//! arithmetic formula instead of a table. Grammar (case-insensitive):
//!
//! ```text
//! sum     := product ( ('+' | '-') product )*
//! product := unary ( ('*' | '/') unary )*
//! unary   := '-' unary | power
//! power   := atom ( '^' unary )?
//! atom    := number | variable | func '(' sum ( ',' sum )* ')' | '(' sum ')'
//! variable:= I<n> | ARG<n> | $<n>
//! ```
//!
//! Functions: `ABS SQRT EXP LN LOG LOG10 FLOOR CEIL` (one argument) and
//! `MIN MAX POW` (two arguments). `LOG` is base 10.

use super::RatingHeader;
use crate::error::{RatingError, Result};
use std::fmt;

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Floor,
    Ceil,
    Min,
    Max,
    Pow,
}

impl Function {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "ABS" => Function::Abs,
            "SQRT" => Function::Sqrt,
            "EXP" => Function::Exp,
            "LN" => Function::Ln,
            "LOG" | "LOG10" => Function::Log10,
            "FLOOR" => Function::Floor,
            "CEIL" => Function::Ceil,
            "MIN" => Function::Min,
            "MAX" => Function::Max,
            "POW" => Function::Pow,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Function::Abs => args[0].abs(),
            Function::Sqrt => args[0].sqrt(),
            Function::Exp => args[0].exp(),
            Function::Ln => args[0].ln(),
            Function::Log10 => args[0].log10(),
            Function::Floor => args[0].floor(),
            Function::Ceil => args[0].ceil(),
            Function::Min => args[0].min(args[1]),
            Function::Max => args[0].max(args[1]),
            Function::Pow => args[0].powf(args[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    /// 1-based independent value index.
    Var(usize),
    Neg(Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    Pow(Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn eval(&self, inds: &[f64]) -> f64 {
        match self {
            Node::Number(v) => *v,
            Node::Var(n) => inds.get(n - 1).copied().unwrap_or(f64::NAN),
            Node::Neg(a) => -a.eval(inds),
            Node::Add(a, b) => a.eval(inds) + b.eval(inds),
            Node::Sub(a, b) => a.eval(inds) - b.eval(inds),
            Node::Mul(a, b) => a.eval(inds) * b.eval(inds),
            Node::Div(a, b) => a.eval(inds) / b.eval(inds),
            Node::Pow(a, b) => a.eval(inds).powf(b.eval(inds)),
            Node::Call(f, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(inds)).collect();
                f.apply(&values)
            }
        }
    }

    fn max_var(&self) -> usize {
        match self {
            Node::Number(_) => 0,
            Node::Var(n) => *n,
            Node::Neg(a) => a.max_var(),
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Div(a, b) | Node::Pow(a, b) => {
                a.max_var().max(b.max_var())
            }
            Node::Call(_, args) => args.iter().map(Node::max_var).max().unwrap_or(0),
        }
    }
}

/// A parsed formula. Equality compares the source text.
#[derive(Debug, Clone)]
pub struct Formula {
    text: String,
    root: Node,
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(RatingError::construction("empty formula"));
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            text,
        };
        let root = parser.sum()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            text: text.trim().to_string(),
            root,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Highest independent value index referenced (0 for a constant).
    pub fn max_variable(&self) -> usize {
        self.root.max_var()
    }

    /// Evaluates at `inds`. A missing independent value evaluates as NaN.
    pub fn eval(&self, inds: &[f64]) -> f64 {
        self.root.eval(inds)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Word(String),
    Symbol(char),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal.parse::<f64>().map_err(|_| {
                RatingError::construction(format!("invalid number \"{}\" in formula \"{}\"", literal, text))
            })?;
            tokens.push(Token::Number(value));
        } else if c.is_ascii_alphabetic() || c == '$' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(Token::Word(word.to_ascii_uppercase()));
        } else if "+-*/^(),".contains(c) {
            tokens.push(Token::Symbol(c));
            i += 1;
        } else {
            return Err(RatingError::construction(format!(
                "unexpected character '{}' in formula \"{}\"",
                c, text
            )));
        }
    }
    Ok(tokens)
}

fn variable_index(word: &str) -> Option<usize> {
    let digits = word
        .strip_prefix("ARG")
        .or_else(|| word.strip_prefix('I'))
        .or_else(|| word.strip_prefix('$'))?;
    digits.parse::<usize>().ok().filter(|n| *n > 0)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    text: &'a str,
}

impl Parser<'_> {
    fn error(&self, what: &str) -> RatingError {
        RatingError::construction(format!(
            "invalid formula \"{}\": {} at token {}",
            self.text,
            what,
            self.pos + 1
        ))
    }

    fn eat(&mut self, symbol: char) -> bool {
        if self.tokens.get(self.pos) == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn sum(&mut self) -> Result<Node> {
        let mut left = self.product()?;
        loop {
            if self.eat('+') {
                left = Node::Add(Box::new(left), Box::new(self.product()?));
            } else if self.eat('-') {
                left = Node::Sub(Box::new(left), Box::new(self.product()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn product(&mut self) -> Result<Node> {
        let mut left = self.unary()?;
        loop {
            if self.eat('*') {
                left = Node::Mul(Box::new(left), Box::new(self.unary()?));
            } else if self.eat('/') {
                left = Node::Div(Box::new(left), Box::new(self.unary()?));
            } else {
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat('-') {
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.atom()?;
        if self.eat('^') {
            return Ok(Node::Pow(Box::new(base), Box::new(self.unary()?)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("expected a value"))?;
        self.pos += 1;
        match token {
            Token::Number(v) => Ok(Node::Number(v)),
            Token::Symbol('(') => {
                let inner = self.sum()?;
                if !self.eat(')') {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            Token::Word(word) => {
                if let Some(function) = Function::parse(&word) {
                    return self.call(function);
                }
                variable_index(&word)
                    .map(Node::Var)
                    .ok_or_else(|| self.error(&format!("unknown name {}", word)))
            }
            Token::Symbol(_) => {
                self.pos -= 1;
                Err(self.error("expected a value"))
            }
        }
    }

    fn call(&mut self, function: Function) -> Result<Node> {
        if !self.eat('(') {
            return Err(self.error("expected '(' after function name"));
        }
        let mut args = vec![self.sum()?];
        while self.eat(',') {
            args.push(self.sum()?);
        }
        if !self.eat(')') {
            return Err(self.error("missing ')'"));
        }
        if args.len() != function.arity() {
            return Err(self.error(&format!(
                "{:?} takes {} argument(s), got {}",
                function,
                function.arity(),
                args.len()
            )));
        }
        Ok(Node::Call(function, args))
    }
}

// ---------------------------------------------------------------------------
// ExpressionRating
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRating {
    pub header: RatingHeader,
    formula: Formula,
}

impl ExpressionRating {
    /// The parameter count comes from the header units; the formula may not
    /// reference an independent value beyond it.
    pub fn new(header: RatingHeader, formula: Formula) -> Result<Self> {
        let ind_params = header.ind_param_count();
        header.validate(ind_params)?;
        if ind_params == 0 {
            return Err(RatingError::construction(format!(
                "{}: expression rating needs at least one independent parameter",
                header.rating_spec_id
            )));
        }
        if formula.max_variable() > ind_params {
            return Err(RatingError::construction(format!(
                "{}: formula \"{}\" references I{} but the rating has {} independent parameter(s)",
                header.rating_spec_id,
                formula,
                formula.max_variable(),
                ind_params
            )));
        }
        Ok(Self { header, formula })
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// A non-finite result (division by zero, `LN` of a negative, ...) is
    /// an error rather than a value.
    pub fn rate(&self, ind_values: &[f64]) -> Result<Option<f64>> {
        let value = self.formula.eval(ind_values);
        if !value.is_finite() {
            return Err(RatingError::Formula(format!(
                "{}: \"{}\" gives {} for {:?}",
                self.header.rating_spec_id, self.formula, value, ind_values
            )));
        }
        Ok(Some(value))
    }

    pub fn reverse_rate(&self, _dep_value: f64) -> Result<Option<f64>> {
        Err(RatingError::NotInvertible(format!(
            "{}: formula ratings cannot be reversed",
            self.header.rating_spec_id
        )))
    }
}
