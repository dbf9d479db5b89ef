//! The `{ok, data}` / `{ok, error}` envelope returned to dashboard callers.

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

/// Outcome of one dashboard operation as the UI sees it
#[derive(Debug, Clone, PartialEq)]
pub enum RequestResult<T> {
    Ok(T),
    Err(String),
}

impl<T> RequestResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, RequestResult::Ok(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            RequestResult::Ok(data) => Some(data),
            RequestResult::Err(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestResult::Ok(_) => None,
            RequestResult::Err(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            RequestResult::Ok(data) => Ok(data),
            RequestResult::Err(e) => Err(e),
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for RequestResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => RequestResult::Ok(data),
            Err(e) => RequestResult::Err(e.to_string()),
        }
    }
}

impl<T: Serialize> Serialize for RequestResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RequestResult", 2)?;
        match self {
            RequestResult::Ok(data) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
            }
            RequestResult::Err(error) => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for RequestResult<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::<T>::deserialize(deserializer)?;
        match (envelope.ok, envelope.data, envelope.error) {
            (true, Some(data), _) => Ok(RequestResult::Ok(data)),
            (false, _, Some(error)) => Ok(RequestResult::Err(error)),
            (true, None, _) => Err(serde::de::Error::missing_field("data")),
            (false, _, None) => Err(serde::de::Error::missing_field("error")),
        }
    }
}
