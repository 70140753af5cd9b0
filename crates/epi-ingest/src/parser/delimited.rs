//! Quote-aware CSV decoding into typed rows

use super::SourceParser;
use crate::error::ParseError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Header-keyed CSV reader honoring standard quoting rules
#[derive(Debug, Clone, Copy)]
pub struct DelimitedParser<T> {
    _row: PhantomData<fn() -> T>,
}

impl<T> Default for DelimitedParser<T> {
    fn default() -> Self {
        Self { _row: PhantomData }
    }
}

impl<T> DelimitedParser<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: DeserializeOwned> SourceParser for DelimitedParser<T> {
    type Output = Vec<T>;

    fn parse(&self, name: &str, raw: &str) -> Result<Vec<T>, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());

        reader
            .deserialize::<T>()
            .collect::<Result<Vec<T>, _>>()
            .map_err(|source| ParseError::Csv {
                name: name.to_string(),
                source,
            })
    }
}
