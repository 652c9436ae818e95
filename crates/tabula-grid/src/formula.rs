//! Restricted formula evaluator.
//!
//! Text after a leading `=` is tokenized and parsed by a small recursive
//! descent parser into an [`Expr`] tree, then evaluated once against a
//! [`CellSource`]. Only literals, cell references, ranges, arithmetic,
//! comparisons, `&` and the fixed function catalog are understood; nothing
//! is ever handed to a general-purpose evaluator. The result is stored as
//! plain text and never recalculated.

use std::cmp::Ordering;

use tabula_core::Value;
use unicase::UniCase;

use crate::error::{GridError, Result};

/// Stored in place of a formula that failed to parse or evaluate
pub const FORMULA_ERROR: &str = "#ERRO!";

/// Longest formula, in tokens
const MAX_TOKENS: usize = 1024;

/// Deepest nesting of parentheses, signs and powers
const MAX_NESTING: usize = 64;

/// Largest range a single argument may expand to, after clipping
const MAX_RANGE_CELLS: usize = 1_000_000;

/// Read access to the presented grid. Rows index the presented view and
/// columns the visible column order, both zero-based.
pub trait CellSource {
    fn value_at(&self, row: usize, col: usize) -> Option<Value>;

    /// Row and column count, when known. Ranges are clipped to it.
    fn bounds(&self) -> Option<(usize, usize)> {
        None
    }
}

impl<F> CellSource for F
where
    F: Fn(usize, usize) -> Option<Value>,
{
    fn value_at(&self, row: usize, col: usize) -> Option<Value> {
        self(row, col)
    }
}

/// Whether committed text should go through the evaluator
pub fn is_formula(text: &str) -> bool {
    text.trim_start().starts_with('=')
}

/// Evaluate a formula (with or without its leading `=`) to display text.
pub fn evaluate_formula(text: &str, source: &dyn CellSource) -> Result<String> {
    let body = text.trim_start();
    let body = body.strip_prefix('=').unwrap_or(body);
    let tokens = tokenize(body)?;
    if tokens.len() > MAX_TOKENS {
        return Err(formula_error(format!("formula is longer than {MAX_TOKENS} tokens")));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(formula_error(format!(
            "unexpected {:?} after expression",
            parser.tokens[parser.pos]
        )));
    }
    let value = Evaluator { source }.eval_scalar(&expr)?;
    value.into_text()
}

/// Evaluate, degrading any failure to [`FORMULA_ERROR`].
pub fn evaluate_or_sentinel(text: &str, source: &dyn CellSource) -> String {
    match evaluate_formula(text, source) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(formula = %text, error = %e, "formula evaluation failed");
            FORMULA_ERROR.to_string()
        }
    }
}

/// Spreadsheet letters for a zero-based column index (`0` is `A`, `26` is `AA`).
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Zero-based column index for spreadsheet letters
pub fn parse_column_letters(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: usize = 0;
    for c in letters.chars() {
        col = col
            .checked_mul(26)?
            .checked_add((c.to_ascii_uppercase() as u8 - b'A' + 1) as usize)?;
    }
    Some(col - 1)
}

fn formula_error(message: impl Into<String>) -> GridError {
    GridError::Formula(message.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    LParen,
    RParen,
    Separator,
    Colon,
    Op(&'static str),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.peek().copied() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let mut buf = String::new();
            while let Some(c) = chars.peek().copied() {
                if c.is_ascii_digit() || c == '.' {
                    buf.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let number: f64 = buf
                .parse()
                .map_err(|_| formula_error(format!("invalid number literal: {buf}")))?;
            tokens.push(Token::Number(number));
            continue;
        }

        if ch.is_alphabetic() {
            let mut buf = String::new();
            while let Some(c) = chars.peek().copied() {
                if c.is_alphanumeric() || c == '.' || c == '_' {
                    buf.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(buf));
            continue;
        }

        chars.next();
        let token = match ch {
            '"' => {
                let mut buf = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            buf.push('"');
                        }
                        Some('"') => break,
                        Some(c) => buf.push(c),
                        None => return Err(formula_error("unterminated string literal")),
                    }
                }
                Token::Text(buf)
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' | ';' => Token::Separator,
            ':' => Token::Colon,
            '+' => Token::Op("+"),
            '-' => Token::Op("-"),
            '*' => Token::Op("*"),
            '/' => Token::Op("/"),
            '^' => Token::Op("^"),
            '&' => Token::Op("&"),
            '=' => Token::Op("="),
            '<' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Op("<=")
                }
                Some('>') => {
                    chars.next();
                    Token::Op("<>")
                }
                _ => Token::Op("<"),
            },
            '>' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Op(">=")
                }
                _ => Token::Op(">"),
            },
            other => return Err(formula_error(format!("unexpected character: {other}"))),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRef {
    row: usize,
    col: usize,
}

impl CellRef {
    /// `B3` style reference: letters then a 1-based row number
    fn parse(ident: &str) -> Option<Self> {
        let split = ident.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = ident.split_at(split);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let col = parse_column_letters(letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self { row: row - 1, col })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sum,
    Average,
    Max,
    Min,
    Count,
    CountA,
    If,
    Vlookup,
    Concatenate,
    Today,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let upper = name.to_uppercase();
        let function = match upper.as_str() {
            "SUM" | "SOMA" => Self::Sum,
            "AVERAGE" | "MEDIA" | "MÉDIA" => Self::Average,
            "MAX" | "MÁXIMO" | "MAXIMO" => Self::Max,
            "MIN" | "MÍNIMO" | "MINIMO" => Self::Min,
            "COUNT" | "CONT.NÚM" | "CONT.NUM" => Self::Count,
            "COUNTA" | "CONT.VALORES" => Self::CountA,
            "IF" | "SE" => Self::If,
            "VLOOKUP" | "PROCV" => Self::Vlookup,
            "CONCATENATE" | "CONCAT" | "CONCATENAR" => Self::Concatenate,
            "TODAY" | "HOJE" => Self::Today,
            _ => return None,
        };
        Some(function)
    }

    /// Inclusive argument count bounds
    fn arity(self) -> (usize, usize) {
        match self {
            Self::If => (2, 3),
            Self::Vlookup => (3, 4),
            Self::Today => (0, 0),
            _ => (1, usize::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Ref(CellRef),
    Range(CellRef, CellRef),
    Negate(Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_op(&self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(formula_error(format!("expected {expected:?}, found {other:?}"))),
        }
    }

    // comparison := concat (cmp-op concat)*
    fn parse_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_concat()?;
        while let Some(op) = self.peek_op(&["=", "<>", "<", ">", "<=", ">="]) {
            self.pos += 1;
            let right = self.parse_concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        while let Some(op) = self.peek_op(&["&"]) {
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.peek_op(&["+", "-"]) {
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_op(&["*", "/"]) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // every recursive path passes through here
    fn parse_unary(&mut self) -> Result<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(formula_error(format!("nested deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let expr = self.parse_signed();
        self.depth -= 1;
        expr
    }

    fn parse_signed(&mut self) -> Result<Expr> {
        match self.peek_op(&["-", "+"]) {
            Some("-") => {
                self.pos += 1;
                Ok(Expr::Negate(Box::new(self.parse_unary()?)))
            }
            Some(_) => {
                self.pos += 1;
                self.parse_unary()
            }
            None => self.parse_power(),
        }
    }

    // right-associative
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if self.peek_op(&["^"]).is_some() {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary("^", Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.parse_call(&name);
                }
                if let Some(start) = CellRef::parse(&name) {
                    if self.peek() == Some(&Token::Colon) {
                        self.pos += 1;
                        let end = match self.next() {
                            Some(Token::Ident(end)) => CellRef::parse(&end),
                            _ => None,
                        }
                        .ok_or_else(|| formula_error("invalid range end"))?;
                        return Ok(Expr::Range(start, end));
                    }
                    return Ok(Expr::Ref(start));
                }
                match name.to_uppercase().as_str() {
                    "TRUE" | "VERDADEIRO" => Ok(Expr::Bool(true)),
                    "FALSE" | "FALSO" => Ok(Expr::Bool(false)),
                    _ => Err(formula_error(format!("unknown name: {name}"))),
                }
            }
            other => Err(formula_error(format!("unexpected {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr> {
        let function =
            Function::lookup(name).ok_or_else(|| formula_error(format!("unknown function: {name}")))?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.parse_expression()?);
                match self.next() {
                    Some(Token::Separator) => continue,
                    Some(Token::RParen) => break,
                    other => {
                        return Err(formula_error(format!(
                            "expected separator or ')', found {other:?}"
                        )))
                    }
                }
            }
        }
        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(formula_error(format!(
                "{name} takes {min}..{max} arguments, got {}",
                args.len()
            )));
        }
        Ok(Expr::Call(function, args))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl Scalar {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Scalar::Empty,
            Some(Value::Bool(b)) => Scalar::Bool(b),
            Some(Value::Int32(i)) => Scalar::Number(i as f64),
            Some(Value::Int64(i)) => Scalar::Number(i as f64),
            Some(Value::Float64(f)) => Scalar::Number(f),
            Some(other) => Scalar::Text(other.display_text()),
        }
    }

    /// Arithmetic coercion: anything non-numeric counts as 0
    fn to_number(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Strict coercion used by aggregates and comparisons
    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Scalar::Empty => None,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Scalar::Number(n) => format_number(*n),
            Scalar::Text(s) => s.clone(),
            Scalar::Bool(true) => "TRUE".to_string(),
            Scalar::Bool(false) => "FALSE".to_string(),
            Scalar::Empty => String::new(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => match s.trim().to_uppercase().as_str() {
                "" | "FALSE" | "FALSO" | "0" => false,
                _ => true,
            },
            Scalar::Empty => false,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn into_text(self) -> Result<String> {
        if let Scalar::Number(n) = self {
            if !n.is_finite() {
                return Err(formula_error("result is not a finite number"));
            }
        }
        Ok(self.to_text())
    }
}

/// Integers print without a decimal point
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let (ta, tb) = (a.to_text(), b.to_text());
            UniCase::new(ta.as_str()).cmp(&UniCase::new(tb.as_str()))
        }
    }
}

struct Evaluator<'a> {
    source: &'a dyn CellSource,
}

impl Evaluator<'_> {
    fn cell(&self, r: CellRef) -> Scalar {
        Scalar::from_value(self.source.value_at(r.row, r.col))
    }

    /// Cells of a range, row-major, as rows. Cells past the source's
    /// bounds are always empty, so the range is clipped to them.
    fn range_rows(&self, a: CellRef, b: CellRef) -> Result<Vec<Vec<Scalar>>> {
        let (top, mut bottom) = (a.row.min(b.row), a.row.max(b.row));
        let (left, mut right) = (a.col.min(b.col), a.col.max(b.col));
        if let Some((rows, cols)) = self.source.bounds() {
            if top >= rows || left >= cols {
                return Ok(Vec::new());
            }
            bottom = bottom.min(rows - 1);
            right = right.min(cols - 1);
        }
        let cells = (bottom - top)
            .saturating_add(1)
            .saturating_mul((right - left).saturating_add(1));
        if cells > MAX_RANGE_CELLS {
            return Err(formula_error(format!(
                "range covers {cells} cells, more than {MAX_RANGE_CELLS}"
            )));
        }
        Ok((top..=bottom)
            .map(|row| {
                (left..=right)
                    .map(|col| self.cell(CellRef { row, col }))
                    .collect()
            })
            .collect())
    }

    /// Flatten an argument: ranges expand, everything else is one value
    fn eval_values(&self, expr: &Expr) -> Result<Vec<Scalar>> {
        match expr {
            Expr::Range(a, b) => Ok(self.range_rows(*a, *b)?.into_iter().flatten().collect()),
            other => Ok(vec![self.eval_scalar(other)?]),
        }
    }

    /// Numbers for aggregates. References and ranges skip non-numeric
    /// cells; literal arguments coerce.
    fn numbers(&self, args: &[Expr]) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Expr::Range(..) | Expr::Ref(_) => {
                    out.extend(self.eval_values(arg)?.iter().filter_map(Scalar::as_number))
                }
                other => out.push(self.eval_scalar(other)?.to_number()),
            }
        }
        Ok(out)
    }

    fn eval_scalar(&self, expr: &Expr) -> Result<Scalar> {
        match expr {
            Expr::Number(n) => Ok(Scalar::Number(*n)),
            Expr::Text(s) => Ok(Scalar::Text(s.clone())),
            Expr::Bool(b) => Ok(Scalar::Bool(*b)),
            Expr::Ref(r) => Ok(self.cell(*r)),
            Expr::Range(..) => Err(formula_error("a range can only be used as a function argument")),
            Expr::Negate(inner) => Ok(Scalar::Number(-self.eval_scalar(inner)?.to_number())),
            Expr::Binary(op, left, right) => {
                let l = self.eval_scalar(left)?;
                let r = self.eval_scalar(right)?;
                self.binary(op, &l, &r)
            }
            Expr::Call(function, args) => self.call(*function, args),
        }
    }

    fn binary(&self, op: &str, l: &Scalar, r: &Scalar) -> Result<Scalar> {
        let (x, y) = (l.to_number(), r.to_number());
        let result = match op {
            "+" => Scalar::Number(x + y),
            "-" => Scalar::Number(x - y),
            "*" => Scalar::Number(x * y),
            "/" => {
                if y == 0.0 {
                    return Err(formula_error("division by zero"));
                }
                Scalar::Number(x / y)
            }
            "^" => Scalar::Number(x.powf(y)),
            "&" => Scalar::Text(format!("{}{}", l.to_text(), r.to_text())),
            "=" => Scalar::Bool(compare_scalars(l, r) == Ordering::Equal),
            "<>" => Scalar::Bool(compare_scalars(l, r) != Ordering::Equal),
            "<" => Scalar::Bool(compare_scalars(l, r) == Ordering::Less),
            ">" => Scalar::Bool(compare_scalars(l, r) == Ordering::Greater),
            "<=" => Scalar::Bool(compare_scalars(l, r) != Ordering::Greater),
            ">=" => Scalar::Bool(compare_scalars(l, r) != Ordering::Less),
            other => return Err(formula_error(format!("unknown operator {other}"))),
        };
        if let Scalar::Number(n) = result {
            if !n.is_finite() {
                return Err(formula_error("arithmetic overflow"));
            }
        }
        Ok(result)
    }

    fn call(&self, function: Function, args: &[Expr]) -> Result<Scalar> {
        match function {
            Function::Sum => Ok(Scalar::Number(self.numbers(args)?.iter().sum())),
            Function::Average => {
                let nums = self.numbers(args)?;
                if nums.is_empty() {
                    return Err(formula_error("average of no numbers"));
                }
                Ok(Scalar::Number(nums.iter().sum::<f64>() / nums.len() as f64))
            }
            Function::Max => Ok(Scalar::Number(
                self.numbers(args)?
                    .into_iter()
                    .reduce(f64::max)
                    .unwrap_or(0.0),
            )),
            Function::Min => Ok(Scalar::Number(
                self.numbers(args)?
                    .into_iter()
                    .reduce(f64::min)
                    .unwrap_or(0.0),
            )),
            Function::Count => {
                let mut count = 0usize;
                for arg in args {
                    count += self
                        .eval_values(arg)?
                        .iter()
                        .filter(|v| v.as_number().is_some())
                        .count();
                }
                Ok(Scalar::Number(count as f64))
            }
            Function::CountA => {
                let mut count = 0usize;
                for arg in args {
                    count += self.eval_values(arg)?.iter().filter(|v| !v.is_blank()).count();
                }
                Ok(Scalar::Number(count as f64))
            }
            Function::If => {
                let condition = self.eval_scalar(&args[0])?;
                if condition.is_truthy() {
                    self.eval_scalar(&args[1])
                } else {
                    match args.get(2) {
                        Some(otherwise) => self.eval_scalar(otherwise),
                        None => Ok(Scalar::Bool(false)),
                    }
                }
            }
            Function::Vlookup => self.vlookup(args),
            Function::Concatenate => {
                let mut out = String::new();
                for arg in args {
                    for value in self.eval_values(arg)? {
                        out.push_str(&value.to_text());
                    }
                }
                Ok(Scalar::Text(out))
            }
            Function::Today => Ok(Scalar::Text(
                chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
            )),
        }
    }

    /// `VLOOKUP(key, range, column, [approximate])`. Exact match unless the
    /// fourth argument is truthy, in which case the last row whose key is
    /// not greater than the lookup key wins.
    fn vlookup(&self, args: &[Expr]) -> Result<Scalar> {
        let key = self.eval_scalar(&args[0])?;
        let Expr::Range(a, b) = &args[1] else {
            return Err(formula_error("lookup table must be a range"));
        };
        let index = self.eval_scalar(&args[2])?.to_number();
        let approximate = match args.get(3) {
            Some(arg) => self.eval_scalar(arg)?.is_truthy(),
            None => false,
        };
        let rows = self.range_rows(*a, *b)?;
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if index < 1.0 || index.fract() != 0.0 || index as usize > width {
            return Err(formula_error("lookup column out of range"));
        }
        let column = index as usize - 1;

        let found = if approximate {
            rows.iter()
                .take_while(|row| compare_scalars(&row[0], &key) != Ordering::Greater)
                .last()
        } else {
            rows.iter()
                .find(|row| compare_scalars(&row[0], &key) == Ordering::Equal)
        };
        found
            .map(|row| row[column].clone())
            .ok_or_else(|| formula_error("lookup key not found"))
    }
}
