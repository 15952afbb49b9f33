//! The quote record and its structural validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A quote as returned by the quote source and forwarded to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Identifier assigned by the source.
    pub id: i64,
    /// Quote text.
    pub quote: String,
    /// Attribution.
    pub author: String,
}

/// Reasons a payload is not a valid [`Quote`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload is not a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// A required field is absent or null.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present with the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Description of the accepted type.
        expected: &'static str,
    },
}

impl Quote {
    /// Checks that `value` has the shape of a quote and builds it.
    ///
    /// `id` must be an integer, `quote` and `author` must be strings. Extra
    /// fields are ignored. Validating the JSON form of a valid quote yields
    /// the same quote.
    pub fn validate(value: &Value) -> Result<Quote, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let id = required(object, "id")?
            .as_i64()
            .ok_or(ValidationError::WrongType {
                field: "id",
                expected: "an integer",
            })?;

        Ok(Quote {
            id,
            quote: string_field(object, "quote")?,
            author: string_field(object, "author")?,
        })
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn string_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ValidationError> {
    required(object, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or(ValidationError::WrongType {
            field,
            expected: "a string",
        })
}
