//! JSON value codec
//!
//! Maps any serde-compatible value to one canonical JSON text and back. The
//! shape to decode into is the codec's type parameter, fixed when the codec is
//! built, so no runtime type information is consulted.

use crate::core::{PersistError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

pub struct JsonCodec<T> {
    shape: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    pub const fn new() -> Self {
        Self { shape: PhantomData }
    }

    /// Serialize `value` to its canonical compact JSON text.
    pub fn encode(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| {
            PersistError::EncodingError(format!(
                "Unable to encode {} as JSON: {}",
                std::any::type_name::<T>(),
                e
            ))
        })
    }

    /// Parse stored JSON text back into `T`.
    ///
    /// Fields present in the text but unknown to `T` are ignored.
    pub fn decode(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| {
            PersistError::DecodingError(format!(
                "Unable to decode {} from JSON: {}",
                std::any::type_name::<T>(),
                e
            ))
        })
    }

    /// Deep copy by round-tripping through the text form.
    pub fn copy(&self, value: &T) -> Result<T> {
        let text = self.encode(value)?;
        self.decode(&text)
    }

    pub fn equals(&self, a: &T, b: &T) -> bool
    where
        T: PartialEq,
    {
        a == b
    }
}

impl<T> Default for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self { shape: PhantomData }
    }
}

impl<T> Copy for JsonCodec<T> {}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}
