//! National series merged from the per-metric time series grids

use super::SeriesFill;
use crate::dates;
use crate::error::ParseError;
use crate::models::{CaseRecord, Metric, RawSeriesPoint, NATIONAL_REGION};
use crate::parser::Grid;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Leading metadata columns: Province/State, Country/Region, Lat, Long
pub const METADATA_COLUMNS: usize = 4;

/// Province/State value of the aggregate row
pub const NATIONAL_PROVINCE: &str = "";

/// Country/Region value of the aggregate row
pub const NATIONAL_COUNTRY: &str = "US";

/// Merge the aggregate row of each metric grid into one record per date.
///
/// A date missing from one grid inherits that metric from the previous
/// date, like the state series.
pub fn reconcile_national(
    confirmed: &Grid,
    recovered: &Grid,
    deaths: &Grid,
) -> Result<Vec<CaseRecord>, ParseError> {
    let mut by_date: BTreeMap<NaiveDate, RawSeriesPoint> = BTreeMap::new();

    for (metric, grid) in [
        (Metric::Confirmed, confirmed),
        (Metric::Recovered, recovered),
        (Metric::Deaths, deaths),
    ] {
        accumulate(&mut by_date, metric, grid)?;
    }

    let mut fill = SeriesFill::default();
    Ok(by_date
        .into_iter()
        .map(|(date, point)| CaseRecord::new(NATIONAL_REGION, None, date, fill.fill(&point)))
        .collect())
}

fn accumulate(
    by_date: &mut BTreeMap<NaiveDate, RawSeriesPoint>,
    metric: Metric,
    grid: &Grid,
) -> Result<(), ParseError> {
    let name = format!("national-{}", metric);

    let Some((header, rows)) = grid.split_first() else {
        return Err(ParseError::Empty { name });
    };
    if header.len() < METADATA_COLUMNS {
        return Err(ParseError::HeaderTooShort {
            name,
            found: header.len(),
            expected: METADATA_COLUMNS,
        });
    }

    let row = rows
        .iter()
        .find(|row| is_national_row(row))
        .ok_or_else(|| ParseError::MissingNationalRow {
            name: name.clone(),
            country: NATIONAL_COUNTRY.to_string(),
        })?;

    for (column, label) in header.iter().enumerate().skip(METADATA_COLUMNS) {
        let date = dates::parse_short_us(label)?;
        let value = parse_count(&name, label, row.get(column).map(String::as_str))?;
        by_date.entry(date).or_default().set(metric, value);
    }

    debug!(
        metric = %metric,
        dates = header.len() - METADATA_COLUMNS,
        "Merged national series"
    );

    Ok(())
}

fn is_national_row(row: &[String]) -> bool {
    matches!(
        row,
        [province, country, ..] if province.trim() == NATIONAL_PROVINCE && country.trim() == NATIONAL_COUNTRY
    )
}

/// Blank or absent cells are a gap, anything else must be a non-negative integer
fn parse_count(name: &str, date: &str, cell: Option<&str>) -> Result<Option<i64>, ParseError> {
    let Some(cell) = cell.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    match cell.parse::<i64>() {
        Ok(value) if value >= 0 => Ok(Some(value)),
        _ => Err(ParseError::InvalidCount {
            name: name.to_string(),
            date: date.to_string(),
            value: cell.to_string(),
        }),
    }
}
