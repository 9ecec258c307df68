use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use super::error::ValidatedAuthorizationError;

/// An untyped (JSON) Object from which [TypedParameters](TypedParameter) can be parsed.
///
/// Represents the claims of a request object, or bare authorization request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter of an authorization request.
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + TryInto<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Get a [TypedParameter] from the Object.
    ///
    /// Note that this method clones the underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        Some(self.0.get(T::KEY)?.clone().try_into())
    }

    /// Get a [TypedParameter], treating a malformed value as absent.
    pub fn get_lenient<T: TypedParameter>(&self) -> Option<T> {
        match self.get::<T>()? {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("ignoring malformed '{}': {e:#}", T::KEY);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl From<Map<String, Json>> for UntypedObject {
    fn from(value: Map<String, Json>) -> Self {
        Self(value)
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

impl TryFrom<Json> for UntypedObject {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        Ok(serde_json::from_value(value).map(Self)?)
    }
}

/// Name used to report a request field, e.g. `client_id` becomes `.clientId`.
pub(crate) fn field_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 1);
    name.push('.');
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

pub trait ParsingErrorContext {
    type T: TypedParameter;

    /// Absent parameters become [MissingRequiredField](ValidatedAuthorizationError::MissingRequiredField),
    /// malformed ones [InvalidAuthorizationData](ValidatedAuthorizationError::InvalidAuthorizationData).
    fn parsing_error(self) -> Result<Self::T, ValidatedAuthorizationError>;
}

impl<T: TypedParameter> ParsingErrorContext for Option<Result<T>> {
    type T = T;

    fn parsing_error(self) -> Result<T, ValidatedAuthorizationError> {
        match self {
            None => Err(ValidatedAuthorizationError::MissingRequiredField(
                field_name(T::KEY),
            )),
            Some(Err(e)) => {
                debug!("'{}' could not be parsed: {e:#}", T::KEY);
                Err(ValidatedAuthorizationError::InvalidAuthorizationData)
            }
            Some(Ok(t)) => Ok(t),
        }
    }
}
