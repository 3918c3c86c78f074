use std::collections::BTreeMap;
use std::fmt;

use crate::number::shortest_repr;

/// A MathJSON expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(Number),
    /// An identifier. Never empty.
    Symbol(String),
    /// A head applied to an ordered list of arguments. The head is usually a
    /// symbol but can be any expression, e.g. `g(f)` in `g(f)(x)`.
    Function(Box<Expression>, Vec<Expression>),
    String(String),
    Dictionary(BTreeMap<String, Expression>),
    /// Placeholder for an absent argument.
    Missing,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Number {
    Machine(f64),
    Decimal(Decimal),
}

/// An exact decimal payload, kept as digit strings so that formatting never
/// goes through binary floating point.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Decimal {
    pub negative: bool,
    /// Digits before the decimal marker, leading zeros preserved.
    pub whole: String,
    /// Digits after the decimal marker, trailing zeros preserved.
    pub fraction: String,
    /// Repeating block following `fraction`, e.g. `6` in `0.1(6)`.
    pub repeating: String,
    pub exponent: Option<i64>,
}

impl Decimal {
    /// Parses a payload such as `-1234567.890e-123`, `012` or `0.1(6)`.
    pub fn parse(payload: &str) -> Option<Decimal> {
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let mut rest = cleaned.strip_suffix(|c: char| c == 'n' || c == 'd').unwrap_or(&cleaned);

        let mut decimal = Decimal::default();
        if let Some(stripped) = rest.strip_prefix('-') {
            decimal.negative = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('+') {
            rest = stripped;
        }

        let (mantissa, exponent) = match rest.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };
        if let Some(exponent) = exponent {
            let digits = exponent.trim_start_matches(|c: char| c == '+' || c == '-');
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            decimal.exponent = Some(exponent.parse().ok()?);
        }

        let (whole, fraction) = match mantissa.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (mantissa, ""),
        };
        let (fraction, repeating) = match fraction.split_once('(') {
            Some((fraction, repeating)) => (fraction, repeating.strip_suffix(')')?),
            None => (fraction, ""),
        };
        if [whole, fraction, repeating]
            .iter()
            .any(|part| !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return None;
        }
        if whole.is_empty() && fraction.is_empty() && repeating.is_empty() {
            return None;
        }
        decimal.whole = whole.to_string();
        decimal.fraction = fraction.to_string();
        decimal.repeating = repeating.to_string();
        Some(decimal)
    }

    pub fn is_zero(&self) -> bool {
        self.whole
            .chars()
            .chain(self.fraction.chars())
            .chain(self.repeating.chars())
            .all(|c| c == '0')
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{}", self.whole)?;
        if !self.fraction.is_empty() || !self.repeating.is_empty() {
            write!(f, ".{}", self.fraction)?;
        }
        if !self.repeating.is_empty() {
            write!(f, "({})", self.repeating)?;
        }
        if let Some(exponent) = self.exponent {
            write!(f, "e{exponent}")?;
        }
        Ok(())
    }
}

impl Number {
    /// Interprets a MathJSON `num` payload. Infinities and NaN become
    /// machine values; everything else stays an exact decimal.
    pub fn parse_payload(payload: &str) -> Option<Number> {
        let lowered: String = payload
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match lowered.as_str() {
            "infinity" | "+infinity" => Some(Number::Machine(f64::INFINITY)),
            "-infinity" => Some(Number::Machine(f64::NEG_INFINITY)),
            "nan" => Some(Number::Machine(f64::NAN)),
            _ => Decimal::parse(payload).map(Number::Decimal),
        }
    }

    /// Builds a number from a literal collected by the parser. The literal
    /// becomes a machine value only if it is exactly how that value would be
    /// printed back.
    pub fn from_literal(literal: &str) -> Option<Number> {
        let decimal = Decimal::parse(literal)?;
        if decimal.repeating.is_empty() {
            let canonical = literal.strip_prefix('+').unwrap_or(literal);
            if let Ok(value) = canonical.parse::<f64>() {
                if value.is_finite() && shortest_repr(value) == canonical {
                    return Some(Number::Machine(value));
                }
            }
        }
        Some(Number::Decimal(decimal))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Machine(value) => *value < 0.0,
            Number::Decimal(decimal) => decimal.negative && !decimal.is_zero(),
        }
    }

    /// The value as an integer, if it is one that fits in an `i64`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Number::Machine(value) => {
                (value.fract() == 0.0 && value.abs() < 9.0e15).then_some(*value as i64)
            }
            Number::Decimal(decimal) => {
                if decimal.exponent.is_some()
                    || !decimal.repeating.is_empty()
                    || decimal.fraction.bytes().any(|b| b != b'0')
                {
                    return None;
                }
                let magnitude: i64 = if decimal.whole.is_empty() {
                    0
                } else {
                    decimal.whole.parse().ok()?
                };
                Some(if decimal.negative { -magnitude } else { magnitude })
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Number::Machine(value) => Some(*value),
            Number::Decimal(decimal) => decimal.to_string().parse().ok(),
        }
    }
}

impl Expression {
    pub fn symbol(name: impl Into<String>) -> Expression {
        Expression::Symbol(name.into())
    }

    pub fn string(text: impl Into<String>) -> Expression {
        Expression::String(text.into())
    }

    pub fn number(value: f64) -> Expression {
        Expression::Number(Number::Machine(value))
    }

    /// A number from a MathJSON payload string such as `"012"` or `"NaN"`.
    pub fn decimal(payload: &str) -> Option<Expression> {
        Number::parse_payload(payload).map(Expression::Number)
    }

    /// A function application with a symbol head.
    pub fn function(head: impl Into<String>, args: Vec<Expression>) -> Expression {
        Expression::Function(Box::new(Expression::Symbol(head.into())), args)
    }

    pub fn apply(head: Expression, args: Vec<Expression>) -> Expression {
        Expression::Function(Box::new(head), args)
    }

    /// `["Error", ["LatexString", 'latex'], 'code']`
    pub fn error(code: &str, latex: &str) -> Expression {
        Expression::function(
            "Error",
            vec![
                Expression::function("LatexString", vec![Expression::string(latex)]),
                Expression::string(code),
            ],
        )
    }

    /// The symbol name of the head, for applications with a symbol head.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Expression::Function(head, _) => head.as_symbol(),
            _ => None,
        }
    }

    pub fn arguments(&self) -> &[Expression] {
        match self {
            Expression::Function(_, args) => args,
            _ => &[],
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expression::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Expression::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Expression::Missing)
    }

    /// The error code of an `Error` expression.
    pub fn error_code(&self) -> Option<&str> {
        if self.head_name() != Some("Error") {
            return None;
        }
        self.arguments().iter().find_map(|arg| match arg {
            Expression::String(code) => Some(code.as_str()),
            _ => None,
        })
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::number(value)
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        Expression::number(f64::from(value))
    }
}

impl From<Number> for Expression {
    fn from(value: Number) -> Self {
        Expression::Number(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::serialization::to_json(self))
    }
}
