//! Simple delimiter-split grid

use super::SourceParser;
use crate::error::ParseError;

/// Rows of fields; the first row is the header
pub type Grid = Vec<Vec<String>>;

/// Splits lines, then fields on a single delimiter.
///
/// Quotes are not interpreted, so a quoted field containing the delimiter
/// spans several cells. Callers only rely on rows where that cannot happen.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridParser;

impl GridParser {
    const DELIMITER: char = ',';
}

impl SourceParser for GridParser {
    type Output = Grid;

    fn parse(&self, name: &str, raw: &str) -> Result<Grid, ParseError> {
        let grid: Grid = raw
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| line.split(Self::DELIMITER).map(str::to_string).collect())
            .collect();

        if grid.is_empty() {
            return Err(ParseError::Empty {
                name: name.to_string(),
            });
        }

        Ok(grid)
    }
}
