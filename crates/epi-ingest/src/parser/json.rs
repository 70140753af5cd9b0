//! Array-of-object JSON feeds

use super::SourceParser;
use crate::error::ParseError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy)]
pub struct JsonParser<T> {
    _row: PhantomData<fn() -> T>,
}

impl<T> Default for JsonParser<T> {
    fn default() -> Self {
        Self { _row: PhantomData }
    }
}

impl<T> JsonParser<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: DeserializeOwned> SourceParser for JsonParser<T> {
    type Output = Vec<T>;

    fn parse(&self, name: &str, raw: &str) -> Result<Vec<T>, ParseError> {
        serde_json::from_str(raw).map_err(|source| ParseError::Json {
            name: name.to_string(),
            source,
        })
    }
}
