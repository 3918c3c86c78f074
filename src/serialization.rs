use std::collections::BTreeMap;

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ast::{Expression, Number};
use crate::error::MathJsonError;

/// Largest integer an `f64` holds exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Converts an expression to its MathJSON form.
pub(crate) fn to_json(expr: &Expression) -> Value {
    match expr {
        Expression::Number(number) => number_to_json(number),
        Expression::Symbol(name) => Value::String(name.clone()),
        Expression::String(text) => Value::String(format!("'{text}'")),
        Expression::Function(head, args) => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(to_json(head));
            items.extend(args.iter().map(to_json));
            Value::Array(items)
        }
        Expression::Dictionary(entries) => {
            let map: Map<String, Value> = entries
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect();
            let mut wrapper = Map::new();
            wrapper.insert("dict".to_string(), Value::Object(map));
            Value::Object(wrapper)
        }
        Expression::Missing => Value::String("Missing".to_string()),
    }
}

fn number_to_json(number: &Number) -> Value {
    let payload = match number {
        Number::Machine(value) if value.is_nan() => "NaN".to_string(),
        Number::Machine(value) if value.is_infinite() => {
            let sign = if *value > 0.0 { '+' } else { '-' };
            format!("{sign}Infinity")
        }
        Number::Machine(value) => {
            if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
                return Value::from(*value as i64);
            }
            return serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null);
        }
        Number::Decimal(decimal) => decimal.to_string(),
    };
    let mut map = Map::new();
    map.insert("num".to_string(), Value::String(payload));
    Value::Object(map)
}

/// Reads an expression from its MathJSON form.
pub(crate) fn from_json(value: &Value) -> Result<Expression, MathJsonError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .map(Expression::number)
            .ok_or_else(|| MathJsonError::InvalidNumber(number.to_string())),
        Value::String(text) => string_to_expression(text),
        Value::Array(items) => {
            let (head, args) = items.split_first().ok_or(MathJsonError::EmptyFunction)?;
            let head = from_json(head)?;
            let args = args.iter().map(from_json).collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::Function(Box::new(head), args))
        }
        Value::Object(map) => object_to_expression(map),
        Value::Bool(true) => Ok(Expression::symbol("True")),
        Value::Bool(false) => Ok(Expression::symbol("False")),
        Value::Null => Err(MathJsonError::UnexpectedValue("null".to_string())),
    }
}

fn string_to_expression(text: &str) -> Result<Expression, MathJsonError> {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Ok(Expression::String(text[1..text.len() - 1].to_string()));
    }
    match text {
        "" => Err(MathJsonError::EmptySymbol),
        "Missing" => Ok(Expression::Missing),
        name => Ok(Expression::Symbol(name.to_string())),
    }
}

fn object_to_expression(map: &Map<String, Value>) -> Result<Expression, MathJsonError> {
    if let Some(num) = map.get("num") {
        return match num {
            Value::String(payload) => Number::parse_payload(payload)
                .map(Expression::Number)
                .ok_or_else(|| MathJsonError::InvalidNumber(payload.clone())),
            Value::Number(_) => from_json(num),
            other => Err(MathJsonError::InvalidNumber(other.to_string())),
        };
    }
    if let Some(Value::String(name)) = map.get("sym") {
        if name.is_empty() {
            return Err(MathJsonError::EmptySymbol);
        }
        return Ok(Expression::Symbol(name.clone()));
    }
    if let Some(Value::String(text)) = map.get("str") {
        return Ok(Expression::String(text.clone()));
    }
    if let Some(Value::Array(items)) = map.get("fn") {
        return from_json(&Value::Array(items.clone()));
    }
    if let Some(Value::Object(entries)) = map.get("dict") {
        let mut dict = BTreeMap::new();
        for (key, value) in entries {
            dict.insert(key.clone(), from_json(value)?);
        }
        return Ok(Expression::Dictionary(dict));
    }
    Err(MathJsonError::UnexpectedValue(Value::Object(map.clone()).to_string()))
}

impl Serialize for Expression {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        from_json(&value).map_err(de::Error::custom)
    }
}

impl Expression {
    pub fn from_json_str(text: &str) -> Result<Expression, MathJsonError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| MathJsonError::Json(e.to_string()))?;
        from_json(&value)
    }

    pub fn to_json_value(&self) -> Value {
        to_json(self)
    }

    pub fn to_json_string(&self) -> String {
        to_json(self).to_string()
    }
}
