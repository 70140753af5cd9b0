//! Source parsers
//!
//! Two distinct tabular capabilities exist on purpose:
//! - [`GridParser`] splits on a delimiter with no quote handling, for the
//!   simple time series grids
//! - [`DelimitedParser`] is a full quote-aware CSV reader for sources whose
//!   fields may contain the delimiter
//!
//! [`JsonParser`] decodes array-of-object feeds.

pub mod delimited;
pub mod grid;
pub mod json;

pub use delimited::DelimitedParser;
pub use grid::{Grid, GridParser};
pub use json::JsonParser;

use crate::error::ParseError;

/// Turns raw source text into rows, in source order
pub trait SourceParser {
    type Output;

    /// `name` identifies the source in errors
    fn parse(&self, name: &str, raw: &str) -> Result<Self::Output, ParseError>;
}
