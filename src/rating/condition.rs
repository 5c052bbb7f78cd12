//! Selection conditions for transitional ratings.
//!
//! Grammar (case-insensitive):
//!
//! ```text
//! expr    := and ( OR and )*
//! and     := primary ( AND primary )*
//! primary := '(' expr ')' | operand cmp operand
//! operand := I<n> | R<n> | number
//! cmp     := EQ | NE | LT | LE | GT | GE | == | != | < | <= | > | >=
//! ```
//!
//! `I<n>` is the n-th independent value and `R<n>` the value of the n-th
//! source rating, both 1-based.

use crate::error::{RatingError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Ind(usize),
    Source(usize),
    Literal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn parse(token: &str) -> Option<Self> {
        Some(match token.to_ascii_uppercase().as_str() {
            "EQ" | "==" | "=" => Comparison::Eq,
            "NE" | "!=" => Comparison::Ne,
            "LT" | "<" => Comparison::Lt,
            "LE" | "<=" => Comparison::Le,
            "GT" | ">" => Comparison::Gt,
            "GE" | ">=" => Comparison::Ge,
            _ => return None,
        })
    }

    fn apply(self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare(Operand, Comparison, Operand),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A parsed condition. Equality compares the normalized source text.
#[derive(Debug, Clone)]
pub struct Condition {
    text: String,
    expr: Expr,
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(RatingError::construction("empty transitional condition"));
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            text,
        };
        let expr = parser.or()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            text: tokens.join(" ").to_ascii_uppercase(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Every operand referenced, left to right.
    pub fn operands(&self) -> Vec<Operand> {
        let mut out = Vec::new();
        collect_operands(&self.expr, &mut out);
        out
    }

    /// Evaluates the condition. `value` resolves `I<n>` / `R<n>` operands;
    /// a comparison involving an undefined operand is false.
    pub fn test(&self, value: &mut dyn FnMut(Operand) -> Result<Option<f64>>) -> Result<bool> {
        eval(&self.expr, value)
    }
}

fn collect_operands(expr: &Expr, out: &mut Vec<Operand>) {
    match expr {
        Expr::Compare(a, _, b) => {
            out.push(*a);
            out.push(*b);
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_operands(a, out);
            collect_operands(b, out);
        }
    }
}

fn eval(expr: &Expr, value: &mut dyn FnMut(Operand) -> Result<Option<f64>>) -> Result<bool> {
    match expr {
        Expr::Compare(a, op, b) => {
            let lhs = operand_value(*a, value)?;
            let rhs = operand_value(*b, value)?;
            Ok(match (lhs, rhs) {
                (Some(x), Some(y)) => op.apply(x, y),
                _ => false,
            })
        }
        Expr::And(a, b) => Ok(eval(a, value)? && eval(b, value)?),
        Expr::Or(a, b) => Ok(eval(a, value)? || eval(b, value)?),
    }
}

fn operand_value(
    operand: Operand,
    value: &mut dyn FnMut(Operand) -> Result<Option<f64>>,
) -> Result<Option<f64>> {
    match operand {
        Operand::Literal(v) => Ok(Some(v)),
        other => value(other),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = text.chars().peekable();
    let flush = |word: &mut String, tokens: &mut Vec<String>| {
        if !word.is_empty() {
            tokens.push(std::mem::take(word));
        }
    };
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(c.to_string());
            }
            '<' | '>' | '=' | '!' => {
                flush(&mut word, &mut tokens);
                let mut symbol = c.to_string();
                if chars.peek() == Some(&'=') {
                    symbol.push('=');
                    chars.next();
                }
                tokens.push(symbol);
            }
            _ => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
    text: &'a str,
}

impl Parser<'_> {
    fn error(&self, what: &str) -> RatingError {
        RatingError::construction(format!(
            "invalid transitional condition \"{}\": {} at token {}",
            self.text,
            what,
            self.pos + 1
        ))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|t| t.eq_ignore_ascii_case(keyword))
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.peek_keyword("OR") {
            self.pos += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.primary()?;
        while self.peek_keyword("AND") {
            self.pos += 1;
            let right = self.primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.peek_keyword("(") {
            self.pos += 1;
            let inner = self.or()?;
            if !self.peek_keyword(")") {
                return Err(self.error("missing ')'"));
            }
            self.pos += 1;
            return Ok(inner);
        }
        let left = self.operand()?;
        let op = self
            .tokens
            .get(self.pos)
            .and_then(|t| Comparison::parse(t))
            .ok_or_else(|| self.error("expected a comparison operator"))?;
        self.pos += 1;
        let right = self.operand()?;
        Ok(Expr::Compare(left, op, right))
    }

    fn operand(&mut self) -> Result<Operand> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| self.error("expected an operand"))?;
        let upper = token.to_ascii_uppercase();
        let operand = if let Some(n) = upper.strip_prefix('I').and_then(|n| n.parse::<usize>().ok()) {
            Operand::Ind(n)
        } else if let Some(n) = upper.strip_prefix('R').and_then(|n| n.parse::<usize>().ok()) {
            Operand::Source(n)
        } else if let Ok(v) = token.parse::<f64>() {
            Operand::Literal(v)
        } else {
            return Err(self.error("expected I<n>, R<n> or a number"));
        };
        if matches!(operand, Operand::Ind(0) | Operand::Source(0)) {
            return Err(self.error("operand indices start at 1"));
        }
        self.pos += 1;
        Ok(operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inds(values: &[f64]) -> impl FnMut(Operand) -> Result<Option<f64>> + '_ {
        move |op| match op {
            Operand::Ind(n) => Ok(values.get(n - 1).copied()),
            _ => Ok(None),
        }
    }

    #[test]
    fn test_simple_comparison() {
        let c = Condition::parse("I1 GT 25").unwrap();
        assert!(c.test(&mut inds(&[30.0])).unwrap());
        assert!(!c.test(&mut inds(&[10.0])).unwrap());
        assert!(!c.test(&mut inds(&[25.0])).unwrap());
    }

    #[test]
    fn test_symbols_and_case() {
        let c = Condition::parse("i1>=25 and i2 != 3").unwrap();
        assert_eq!(c.as_str(), "I1 >= 25 AND I2 != 3");
        assert!(c.test(&mut inds(&[25.0, 4.0])).unwrap());
        assert!(!c.test(&mut inds(&[25.0, 3.0])).unwrap());
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // I1 LT 0 OR (I1 GT 10 AND I2 EQ 1)
        let c = Condition::parse("I1 LT 0 OR I1 GT 10 AND I2 EQ 1").unwrap();
        assert!(c.test(&mut inds(&[-1.0, 0.0])).unwrap());
        assert!(c.test(&mut inds(&[11.0, 1.0])).unwrap());
        assert!(!c.test(&mut inds(&[11.0, 0.0])).unwrap());
    }

    #[test]
    fn test_parentheses() {
        let c = Condition::parse("(I1 LT 0 OR I1 GT 10) AND I2 EQ 1").unwrap();
        assert!(!c.test(&mut inds(&[-1.0, 0.0])).unwrap());
        assert!(c.test(&mut inds(&[-1.0, 1.0])).unwrap());
    }

    #[test]
    fn test_undefined_operand_is_false() {
        let c = Condition::parse("R1 NE 5").unwrap();
        assert!(!c.test(&mut inds(&[])).unwrap());
    }

    #[test]
    fn test_operands_listed() {
        let c = Condition::parse("R2 GT I1").unwrap();
        assert_eq!(c.operands(), vec![Operand::Source(2), Operand::Ind(1)]);
    }

    #[test]
    fn test_malformed_conditions() {
        for text in ["", "I1 GT", "I1 25", "X1 GT 2", "(I1 GT 2", "I0 GT 1", "I1 GT 2 I2"] {
            assert!(Condition::parse(text).is_err(), "\"{}\" should not parse", text);
        }
    }
}
