//! Declarative request schemas.
//!
//! A [`Schema`] is a strict description of a JSON object body: every key must
//! be declared, every declared value must be a string, and each string is
//! checked against the field's [`Rule`]s. Schemas are plain statics so every
//! route's contract can be tested against literal payloads.

mod extractors;
pub mod patterns;
pub mod schemas;

use serde_json::Value;

use crate::db::object_id::{self, ObjectId};

pub use extractors::{ValidId, ValidJson, Validated};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Email,
    Link,
    ObjectId,
    MinLen(usize),
    MaxLen(usize),
}

impl Rule {
    fn check(&self, value: &str) -> Result<(), String> {
        let ok = match *self {
            Rule::Email => patterns::is_valid_email(value),
            Rule::Link => patterns::is_valid_link(value),
            Rule::ObjectId => object_id::is_object_id(value),
            Rule::MinLen(min) => value.chars().count() >= min,
            Rule::MaxLen(max) => value.chars().count() <= max,
        };
        if ok {
            return Ok(());
        }
        Err(match *self {
            Rule::Email => "must be a valid email".to_string(),
            Rule::Link => "must be a valid URL".to_string(),
            Rule::ObjectId => format!("must be {} hex characters", object_id::OBJECT_ID_LEN),
            Rule::MinLen(min) => format!("length must be at least {min} characters long"),
            Rule::MaxLen(max) => {
                format!("length must be less than or equal to {max} characters long")
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    pub rules: &'static [Rule],
}

impl Field {
    pub const fn required(name: &'static str, rules: &'static [Rule]) -> Self {
        Self { name, required: true, rules }
    }

    pub const fn optional(name: &'static str, rules: &'static [Rule]) -> Self {
        Self { name, required: false, rules }
    }
}

#[derive(Debug)]
pub struct Schema {
    fields: &'static [Field],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("\"{0}\" is required")]
    Missing(String),
    #[error("\"{0}\" is not allowed")]
    Unknown(String),
    #[error("\"{0}\" must be a string")]
    NotAString(String),
    #[error("\"{field}\" {reason}")]
    Invalid { field: String, reason: String },
}

impl Schema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }

    /// Checks `body` against the schema. Stops at the first offending field.
    pub fn validate(&self, body: &Value) -> Result<(), ValidationError> {
        let object = body.as_object().ok_or(ValidationError::NotAnObject)?;

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.fields.iter().any(|f| f.name == key.as_str()))
        {
            return Err(ValidationError::Unknown(unknown.clone()));
        }

        for field in self.fields {
            match object.get(field.name) {
                None if field.required => {
                    return Err(ValidationError::Missing(field.name.to_string()))
                }
                None => {}
                Some(Value::String(value)) => check_value(field.name, field.rules, value)?,
                Some(_) => return Err(ValidationError::NotAString(field.name.to_string())),
            }
        }
        Ok(())
    }
}

fn check_value(name: &str, rules: &[Rule], value: &str) -> Result<(), ValidationError> {
    for rule in rules {
        rule.check(value).map_err(|reason| ValidationError::Invalid {
            field: name.to_string(),
            reason,
        })?;
    }
    Ok(())
}

/// Validates a path parameter that must be a store identifier.
pub fn validate_id(name: &str, raw: &str) -> Result<ObjectId, ValidationError> {
    check_value(name, &[Rule::ObjectId], raw)?;
    ObjectId::parse(raw).map_err(|e| ValidationError::Invalid {
        field: name.to_string(),
        reason: e.to_string(),
    })
}
