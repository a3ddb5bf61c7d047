//! Typed request/response messages exchanged with the overlay
//!
//! Request bodies are decoded through a [`MessageCodec`] that is chosen when
//! a web service is registered, so the concrete type for a `(service, verb)`
//! pair is fixed up front instead of being looked up by name per request.

use crate::error::CoreError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// A message that can cross the gateway boundary
pub trait Message: Any + Send + Sync + fmt::Debug {
    /// Short type name used in diagnostics and the `/registry` listing
    fn type_name(&self) -> &'static str;

    /// JSON representation sent back to HTTP callers
    fn to_json(&self) -> serde_json::Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

impl<T> Message for T
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Message {
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns the query text when this message is a generic [`Query`]
    pub fn query_text(&self) -> Option<&str> {
        self.downcast_ref::<Query>().map(|q| q.text.as_str())
    }
}

/// Last path segment of a type name, without generic parameters
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Generic query object understood by every overlay service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Whether the query asks for fan-out/aggregate execution
    pub fn is_map_reduce(&self) -> bool {
        self.text.to_ascii_lowercase().contains("mapreduce")
    }
}

/// Decodes raw request payloads into a concrete message type
pub trait MessageCodec: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Zero value of the message type
    fn zero(&self) -> Box<dyn Message>;

    /// Decode a JSON payload. Blank payloads yield the zero value.
    fn decode(&self, data: &[u8]) -> Result<Box<dyn Message>, serde_json::Error>;
}

/// [`MessageCodec`] for any serde type with a `Default` zero value
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageCodec for JsonCodec<T>
where
    T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn zero(&self) -> Box<dyn Message> {
        Box::new(T::default())
    }

    fn decode(&self, data: &[u8]) -> Result<Box<dyn Message>, serde_json::Error> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(self.zero());
        }
        let message: T = serde_json::from_slice(data)?;
        Ok(Box::new(message))
    }
}

/// Flattens the element list returned by the overlay into one response
pub trait ResultAggregator: Send + Sync {
    fn aggregate(&self, elements: &[Box<dyn Message>]) -> Result<Value, CoreError>;
}

/// Wraps every element in a single JSON list field, `{"list": [...]}` by default
#[derive(Debug, Clone)]
pub struct ListAggregator {
    field: String,
}

impl ListAggregator {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Default for ListAggregator {
    fn default() -> Self {
        Self::new("list")
    }
}

impl ResultAggregator for ListAggregator {
    fn aggregate(&self, elements: &[Box<dyn Message>]) -> Result<Value, CoreError> {
        let items = elements
            .iter()
            .map(|element| element.to_json())
            .collect::<Result<Vec<_>, _>>()?;

        let mut object = serde_json::Map::new();
        object.insert(self.field.clone(), Value::Array(items));
        Ok(Value::Object(object))
    }
}
