//! 计算器工具：求值只含 `+ - * / // ** ( )` 与数字的算术表达式
//!
//! 整数运算保持整数，`/` 总是得到浮点数，`//` 为向下取整除法。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::schema::{parameters_schema, parse_args};
use crate::tools::Tool;

/// calculator 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CalculatorArgs {
    /// The mathematical expression to evaluate (e.g., '2+2', '(3+4)*5')
    pub expression: String,
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a basic mathematical expression and return the result. Supports +, -, *, /, parentheses."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<CalculatorArgs>()
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String> {
        let args: CalculatorArgs = parse_args(self.name(), args)?;
        let result = evaluate(&args.expression)
            .map_err(|e| format!("Error evaluating expression: {e}"))?;
        Ok(json!({
            "status": "success",
            "result": result.to_json(),
            "input_expression": args.expression,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            Number::Int(i) => json!(i),
            Number::Float(f) => json!(f),
        }
    }
}

/// 求值算术表达式（忽略空白）
pub fn evaluate(expression: &str) -> Result<Number, String> {
    let tokens: Vec<char> = expression.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    if let Some(bad) = tokens.iter().find(|c| !(c.is_ascii_digit() || "+-*/().".contains(**c))) {
        return Err(format!("Expression contains invalid characters: {bad:?}"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    Ok(value)
}

/// 一元运算、括号与幂指数的最大嵌套层数
const MAX_NESTING: usize = 256;

struct Parser {
    tokens: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.tokens.get(self.pos + offset).copied()
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Number, String> {
        let mut acc = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { add(acc, rhs)? } else { sub(acc, rhs)? };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/' | '//') unary)*
    fn term(&mut self) -> Result<Number, String> {
        let mut acc = self.unary()?;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some('*'), next) if next != Some('*') => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    acc = mul(acc, rhs)?;
                }
                (Some('/'), Some('/')) => {
                    self.pos += 2;
                    let rhs = self.unary()?;
                    acc = floor_div(acc, rhs)?;
                }
                (Some('/'), _) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    acc = div(acc, rhs)?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // 括号、一元符号与幂指数的递归都经过这里
    fn unary(&mut self) -> Result<Number, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = self.unary_inner();
        self.depth -= 1;
        value
    }

    // unary := ('+' | '-') unary | power
    fn unary_inner(&mut self) -> Result<Number, String> {
        match self.peek() {
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            Some('-') => {
                self.pos += 1;
                match self.unary()? {
                    Number::Int(i) => i
                        .checked_neg()
                        .map(Number::Int)
                        .ok_or_else(|| "integer overflow".to_string()),
                    Number::Float(f) => Ok(Number::Float(-f)),
                }
            }
            _ => self.power(),
        }
    }

    // power := primary ('**' unary)?
    fn power(&mut self) -> Result<Number, String> {
        let base = self.primary()?;
        if self.peek() == Some('*') && self.peek_at(1) == Some('*') {
            self.pos += 2;
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<Number, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek() != Some(')') {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected {c:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<Number, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let literal: String = self.tokens[start..self.pos].iter().collect();
        if literal.contains('.') {
            if literal == "." || literal.matches('.').count() > 1 {
                return Err(format!("invalid number {literal:?}"));
            }
            literal
                .parse::<f64>()
                .map(Number::Float)
                .map_err(|e| format!("invalid number {literal:?}: {e}"))
        } else {
            literal
                .parse::<i64>()
                .map(Number::Int)
                .map_err(|e| format!("invalid number {literal:?}: {e}"))
        }
    }
}

fn int_op(
    a: Number,
    b: Number,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Number, String> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int(x, y)
            .map(Number::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        _ => Ok(Number::Float(float(a.as_f64(), b.as_f64()))),
    }
}

fn add(a: Number, b: Number) -> Result<Number, String> {
    int_op(a, b, i64::checked_add, |x, y| x + y)
}

fn sub(a: Number, b: Number) -> Result<Number, String> {
    int_op(a, b, i64::checked_sub, |x, y| x - y)
}

fn mul(a: Number, b: Number) -> Result<Number, String> {
    int_op(a, b, i64::checked_mul, |x, y| x * y)
}

fn div(a: Number, b: Number) -> Result<Number, String> {
    if b.as_f64() == 0.0 {
        return Err("division by zero".to_string());
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

fn floor_div(a: Number, b: Number) -> Result<Number, String> {
    if b.as_f64() == 0.0 {
        return Err("division by zero".to_string());
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let q = x.checked_div(y).ok_or_else(|| "integer overflow".to_string())?;
            // 向负无穷取整
            let adjust = (x % y != 0) && ((x < 0) != (y < 0));
            Ok(Number::Int(if adjust { q - 1 } else { q }))
        }
        _ => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, String> {
    match (base, exponent) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| "exponent too large".to_string())?;
            b.checked_pow(e)
                .map(Number::Int)
                .ok_or_else(|| "integer overflow".to_string())
        }
        _ => {
            if base.as_f64() == 0.0 && exponent.as_f64() < 0.0 {
                return Err("zero cannot be raised to a negative power".to_string());
            }
            Ok(Number::Float(base.as_f64().powf(exponent.as_f64())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(evaluate("2+2"), Ok(Number::Int(4)));
        assert_eq!(evaluate("(3 + 4) * 5"), Ok(Number::Int(35)));
        assert_eq!(evaluate("2+3*4-1"), Ok(Number::Int(13)));
        assert_eq!(evaluate("-2**2"), Ok(Number::Int(-4)));
        assert_eq!(evaluate("2**3**2"), Ok(Number::Int(512)));
    }

    #[test]
    fn test_division() {
        assert_eq!(evaluate("7/2"), Ok(Number::Float(3.5)));
        assert_eq!(evaluate("4/2"), Ok(Number::Float(2.0)));
        assert_eq!(evaluate("7//2"), Ok(Number::Int(3)));
        assert_eq!(evaluate("-7//2"), Ok(Number::Int(-4)));
        assert!(evaluate("1/0").is_err());
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(evaluate("2+x").unwrap_err().contains("invalid characters"));
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("1..2").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2+").is_err());
        assert!(evaluate("()").is_err());
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let signs = format!("{}1", "-".repeat(1_000_000));
        assert_eq!(evaluate(&signs).unwrap_err(), "expression nested too deeply");

        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(evaluate(&parens).unwrap_err(), "expression nested too deeply");

        let powers = format!("2{}", "**1".repeat(100_000));
        assert!(evaluate(&powers).is_err());

        // 正常深度不受影响
        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&shallow), Ok(Number::Int(1)));
        assert_eq!(evaluate("--1"), Ok(Number::Int(1)));
    }

    #[tokio::test]
    async fn test_tool_output_shape() {
        let mut args = Map::new();
        args.insert("expression".into(), json!("2+2"));
        let out = CalculatorTool.execute(args).await.unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(out["result"], json!(4));
        assert_eq!(out["input_expression"], "2+2");
    }
}
