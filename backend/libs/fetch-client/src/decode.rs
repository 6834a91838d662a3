//! Payload decoders
//!
//! The cache stores raw payloads; decoding happens on every read so a cached
//! value goes through the same path as a live one.

use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

pub trait PayloadDecoder: Send + Sync {
    type Output: Send;

    fn decode(&self, raw: &str) -> Result<Self::Output, DecodeError>;
}

/// Deserializes JSON payloads into `T`
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonDecoder")
    }
}

impl<T> PayloadDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send,
{
    type Output = T;

    fn decode(&self, raw: &str) -> Result<T, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Passes the payload through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl PayloadDecoder for TextDecoder {
    type Output = String;

    fn decode(&self, raw: &str) -> Result<String, DecodeError> {
        Ok(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Company {
        id: String,
        name: String,
    }

    #[test]
    fn test_json_decoder() {
        let decoder = JsonDecoder::<Company>::new();
        let company = decoder.decode(r#"{"id":"1","name":"Acme"}"#).unwrap();
        assert_eq!(
            company,
            Company {
                id: "1".to_string(),
                name: "Acme".to_string()
            }
        );
    }

    #[test]
    fn test_json_decoder_rejects_malformed() {
        let decoder = JsonDecoder::<Company>::new();
        assert!(decoder.decode("<html>oops</html>").is_err());
    }
}
