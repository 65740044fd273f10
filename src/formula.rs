//! Arithmetic over metric fields, typed in by the user.
//!
//! Formulas are parsed into an [`Expr`] tree up front; only metric names,
//! numbers, operators and a fixed set of functions are accepted, so nothing
//! a user types can reach anything but the record it is evaluated on.

use crate::data::{Metric, MetricSource};
use std::fmt;
use thiserror::Error;

/// Nesting limit for parentheses, unary chains and ternaries
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("empty formula")]
    Empty,
    #[error("unexpected character {ch:?} at {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("malformed number at {pos}")]
    BadNumber { pos: usize },
    #[error("unexpected {found} at {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unknown field {name:?} at {pos}")]
    UnknownField { name: String, pos: usize },
    #[error("unknown function {name:?} at {pos}")]
    UnknownFunction { name: String, pos: usize },
    #[error("{name} takes {expected} argument(s), got {got} at {pos}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: usize,
        pos: usize,
    },
    #[error("formula nested deeper than {MAX_DEPTH} at {pos}")]
    TooDeep { pos: usize },
}

pub type Result<T> = std::result::Result<T, FormulaError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Min,
    Max,
    Sqrt,
    Ln,
    Log10,
    Pow,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "abs" => Function::Abs,
            "min" => Function::Min,
            "max" => Function::Max,
            "sqrt" => Function::Sqrt,
            "ln" => Function::Ln,
            "log10" => Function::Log10,
            "pow" => Function::Pow,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sqrt => "sqrt",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Pow => "pow",
        }
    }

    fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match (self, args) {
            (Function::Abs, [x]) => x.abs(),
            (Function::Sqrt, [x]) => x.sqrt(),
            (Function::Ln, [x]) => x.ln(),
            (Function::Log10, [x]) => x.log10(),
            // NaN in, NaN out; f64::min would swallow it
            (Function::Min, [a, b]) if a.is_nan() || b.is_nan() => f64::NAN,
            (Function::Min, [a, b]) => a.min(*b),
            (Function::Max, [a, b]) if a.is_nan() || b.is_nan() => f64::NAN,
            (Function::Max, [a, b]) => a.max(*b),
            (Function::Pow, [a, b]) => a.powf(*b),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Field(Metric),
    /// The row's year, `NaN` when unknown
    Year,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

fn truthy(v: f64) -> bool {
    !v.is_nan() && v != 0.0
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl Expr {
    /// Booleans are 1/0. Missing fields read as NaN and propagate through
    /// arithmetic; comparisons against NaN are false.
    pub fn eval(&self, source: &dyn MetricSource) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Field(metric) => source.metric(*metric),
            Expr::Year => source.year().map_or(f64::NAN, f64::from),
            Expr::Unary(UnaryOp::Neg, e) => -e.eval(source),
            Expr::Unary(UnaryOp::Not, e) => flag(!truthy(e.eval(source))),
            Expr::Binary(op, a, b) => {
                let (x, y) = (a.eval(source), b.eval(source));
                match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Sub => x - y,
                    BinaryOp::Mul => x * y,
                    BinaryOp::Div => x / y,
                    BinaryOp::Rem => x % y,
                    BinaryOp::Lt => flag(x < y),
                    BinaryOp::Le => flag(x <= y),
                    BinaryOp::Gt => flag(x > y),
                    BinaryOp::Ge => flag(x >= y),
                    BinaryOp::Eq => flag(x == y),
                    BinaryOp::Ne => flag(x != y),
                    BinaryOp::And => flag(truthy(x) && truthy(y)),
                    BinaryOp::Or => flag(truthy(x) || truthy(y)),
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if truthy(cond.eval(source)) {
                    then.eval(source)
                } else {
                    otherwise.eval(source)
                }
            }
            Expr::Call(function, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(source)).collect();
                function.apply(&values)
            }
        }
    }

    fn collect_fields(&self, out: &mut Vec<Metric>) {
        match self {
            Expr::Number(_) | Expr::Year => {}
            Expr::Field(m) => {
                if !out.contains(m) {
                    out.push(*m);
                }
            }
            Expr::Unary(_, e) => e.collect_fields(out),
            Expr::Binary(_, a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Expr::Conditional(c, t, o) => {
                c.collect_fields(out);
                t.collect_fields(out);
                o.collect_fields(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.collect_fields(out)),
        }
    }
}

/// A parsed formula together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Formula> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            end: source.len(),
        };
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let expr = parser.expression()?;
        if let Some(tok) = parser.peek() {
            return Err(FormulaError::UnexpectedToken {
                found: tok.kind.to_string(),
                pos: tok.pos,
            });
        }
        Ok(Formula {
            source: source.trim().to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn eval(&self, source: &dyn MetricSource) -> f64 {
        self.expr.eval(source)
    }

    /// Metrics referenced, in first-use order
    pub fn fields(&self) -> Vec<Metric> {
        let mut out = Vec::new();
        self.expr.collect_fields(&mut out);
        out
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self> {
        Formula::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Ident(s) => write!(f, "{s:?}"),
            TokenKind::Op(op) => write!(f, "'{op}'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Question => f.write_str("'?'"),
            TokenKind::Colon => f.write_str("':'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

const TWO_CHAR_OPS: [&str; 6] = ["<=", ">=", "==", "!=", "&&", "||"];
const ONE_CHAR_OPS: [&str; 7] = ["+", "-", "*", "/", "%", "<", ">"];

fn lex(src: &str) -> Result<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let value = src[start..i]
                .parse::<f64>()
                .map_err(|_| FormulaError::BadNumber { pos: start })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                pos: start,
            });
            continue;
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.') {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(src[start..i].to_string()),
                pos: start,
            });
            continue;
        }
        let rest = &src[i..];
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token {
                kind: TokenKind::Op(*op),
                pos: start,
            });
            i += 2;
            continue;
        }
        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'!' => TokenKind::Op("!"),
            _ => match ONE_CHAR_OPS.iter().find(|op| op.as_bytes()[0] == c) {
                Some(op) => TokenKind::Op(*op),
                None => {
                    let ch = rest.chars().next().unwrap_or('?');
                    return Err(FormulaError::UnexpectedChar { ch, pos: start });
                }
            },
        };
        tokens.push(Token { kind, pos: start });
        i += 1;
    }
    Ok(tokens)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn here(&self) -> usize {
        self.peek().map_or(self.end, |t| t.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) if ops.contains(op) => {
                self.pos += 1;
                Some(*op)
            }
            _ => None,
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.eat(&kind) {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn unexpected(&self) -> FormulaError {
        FormulaError::UnexpectedToken {
            found: self.peek().map_or_else(|| "end of formula".to_string(), |t| t.kind.to_string()),
            pos: self.here(),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { pos: self.here() });
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let cond = self.or()?;
        let expr = if self.eat(&TokenKind::Question) {
            let then = self.expression()?;
            self.expect(TokenKind::Colon)?;
            let otherwise = self.expression()?;
            Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise))
        } else {
            cond
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expr::Binary(binary_op(op), Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr> {
        self.binary_level(&["||"], Self::and)
    }

    fn and(&mut self) -> Result<Expr> {
        self.binary_level(&["&&"], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(&["<", "<=", ">", ">=", "==", "!="], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(op) = self.eat_op(&["-", "!", "+"]) {
            self.enter()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(match op {
                "-" => Expr::Unary(UnaryOp::Neg, Box::new(operand)),
                "!" => Expr::Unary(UnaryOp::Not, Box::new(operand)),
                _ => operand,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(tok) = self.next() else {
            return Err(self.unexpected());
        };
        match &tok.kind {
            TokenKind::Number(n) => Ok(Expr::Number(*n)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) => {
                self.call(name, tok.pos)
            }
            TokenKind::Ident(name) => {
                let field = name.strip_prefix("d.").unwrap_or(name);
                if field == "year" {
                    return Ok(Expr::Year);
                }
                Metric::from_name(field).map(Expr::Field).ok_or_else(|| FormulaError::UnknownField {
                    name: name.clone(),
                    pos: tok.pos,
                })
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn call(&mut self, name: &str, pos: usize) -> Result<Expr> {
        let function = Function::from_name(name).ok_or_else(|| FormulaError::UnknownFunction {
            name: name.to_string(),
            pos,
        })?;
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        if args.len() != function.arity() {
            return Err(FormulaError::Arity {
                name: function.name(),
                expected: function.arity(),
                got: args.len(),
                pos,
            });
        }
        Ok(Expr::Call(function, args))
    }
}

fn binary_op(op: &str) -> BinaryOp {
    match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "&&" => BinaryOp::And,
        _ => BinaryOp::Or,
    }
}

/// A row pinned to the year it was listed under
struct AtYear<'a, S> {
    year: i32,
    row: &'a S,
}

impl<S: MetricSource> MetricSource for AtYear<'_, S> {
    fn metric(&self, metric: Metric) -> f64 {
        self.row.metric(metric)
    }

    fn year(&self) -> Option<i32> {
        Some(self.year)
    }
}

/// One `(year, value)` per year in `[start, end]` that has a row
pub fn formula_series<S: MetricSource>(
    formula: &Formula,
    rows: impl IntoIterator<Item = (i32, S)>,
    start: i32,
    end: i32,
) -> Vec<(i32, f64)> {
    let mut series: Vec<(i32, f64)> = rows
        .into_iter()
        .filter(|(year, _)| (start..=end).contains(year))
        .map(|(year, row)| (year, formula.eval(&AtYear { year, row: &row })))
        .collect();
    series.sort_by_key(|(year, _)| *year);
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        gdp: f64,
        population: f64,
    }

    impl MetricSource for Row {
        fn metric(&self, metric: Metric) -> f64 {
            match metric {
                Metric::Gdp => self.gdp,
                Metric::Population => self.population,
                _ => f64::NAN,
            }
        }
    }

    fn row() -> Row {
        Row {
            gdp: 100.0,
            population: 50.0,
        }
    }

    fn eval(src: &str) -> f64 {
        Formula::parse(src).unwrap().eval(&row())
    }

    #[test]
    fn test_average_of_two_fields() {
        assert_eq!(eval("(gdp + population) / 2"), 75.0);
        assert_eq!(eval("(d.gdp + d.population) / 2"), 75.0);
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("-2 * 3"), -6.0);
        assert_eq!(eval("7 % 4 + 1"), 4.0);
        assert_eq!(eval("1 + 2 < 4 && 3 > 2"), 1.0);
        assert_eq!(eval("1e3 / .5"), 2000.0);
    }

    #[test]
    fn test_ternary_and_logic() {
        assert_eq!(eval("gdp > population ? gdp : population"), 100.0);
        assert_eq!(eval("gdp < population ? 1 : population > 10 ? 2 : 3"), 2.0);
        assert_eq!(eval("!0 || 0"), 1.0);
        assert_eq!(eval("!gdp"), 0.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("max(gdp, population)"), 100.0);
        assert_eq!(eval("min(gdp, population)"), 50.0);
        assert_eq!(eval("sqrt(abs(-16))"), 4.0);
        assert_eq!(eval("pow(2, 10)"), 1024.0);
        assert_eq!(eval("log10(gdp)"), 2.0);
    }

    #[test]
    fn test_missing_fields_are_nan() {
        assert!(eval("coal_share_elec + 1").is_nan());
        assert!(eval("max(coal_share_elec, 1)").is_nan());
        assert_eq!(eval("coal_share_elec > 1"), 0.0);
    }

    #[test]
    fn test_unknown_field_is_recoverable() {
        let err = Formula::parse("gdp + process.exit").unwrap_err();
        assert_eq!(
            err,
            FormulaError::UnknownField {
                name: "process.exit".into(),
                pos: 6
            }
        );
    }

    #[test]
    fn test_rejects_code() {
        assert!(matches!(
            Formula::parse("gdp; alert(1)"),
            Err(FormulaError::UnexpectedChar { ch: ';', pos: 3 })
        ));
        assert!(matches!(
            Formula::parse("constructor(1)"),
            Err(FormulaError::UnknownFunction { .. })
        ));
        assert!(matches!(Formula::parse("   "), Err(FormulaError::Empty)));
        assert!(matches!(
            Formula::parse("(gdp"),
            Err(FormulaError::UnexpectedToken { pos: 4, .. })
        ));
        assert!(matches!(Formula::parse("pow(2)"), Err(FormulaError::Arity { got: 1, .. })));
        assert!(matches!(Formula::parse("gdp gdp"), Err(FormulaError::UnexpectedToken { pos: 4, .. })));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(Formula::parse(&deep), Err(FormulaError::TooDeep { .. })));
        let negs = format!("{}1", "-".repeat(200));
        assert!(matches!(Formula::parse(&negs), Err(FormulaError::TooDeep { .. })));
    }

    #[test]
    fn test_fields_and_series() {
        let formula: Formula = "gdp / population + gdp".parse().unwrap();
        assert_eq!(formula.fields(), vec![Metric::Gdp, Metric::Population]);

        let rows = vec![
            (2002, Row { gdp: 10.0, population: 5.0 }),
            (2000, Row { gdp: 4.0, population: 2.0 }),
            (1999, Row { gdp: 1.0, population: 1.0 }),
        ];
        assert_eq!(formula_series(&formula, rows, 2000, 2020), vec![(2000, 6.0), (2002, 12.0)]);
    }

    #[test]
    fn test_year_field() {
        // A bare row has no year
        assert!(eval("year").is_nan());
        let formula: Formula = "gdp / (d.year - 1999)".parse().unwrap();
        assert_eq!(formula.fields(), vec![Metric::Gdp]);

        let rows = vec![
            (2000, Row { gdp: 10.0, population: 5.0 }),
            (2004, Row { gdp: 10.0, population: 5.0 }),
        ];
        assert_eq!(formula_series(&formula, rows, 2000, 2020), vec![(2000, 10.0), (2004, 2.0)]);

        let gate: Formula = "year >= 2010 ? population : 0".parse().unwrap();
        let rows = vec![(2009, row()), (2010, row())];
        assert_eq!(formula_series(&gate, rows, 2000, 2020), vec![(2009, 0.0), (2010, 50.0)]);
    }
}
