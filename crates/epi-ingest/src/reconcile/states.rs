//! State-level series from the daily JSON feed

use super::SeriesFill;
use crate::dates;
use crate::error::ParseError;
use crate::models::{CaseRecord, Metric, StateDailyRow, NATIONAL_REGION};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Sort by date, then forward-fill each state's metrics independently.
///
/// The sort is stable, so for repeated (state, date) pairs the first row in
/// source order wins and later ones are dropped.
pub fn reconcile_states(rows: Vec<StateDailyRow>) -> Result<Vec<CaseRecord>, ParseError> {
    let mut dated = rows
        .into_iter()
        .map(|row| dates::parse_compact(row.date).map(|date| (date, row)))
        .collect::<Result<Vec<_>, ParseError>>()?;
    dated.sort_by_key(|(date, _)| *date);

    let mut fills: HashMap<String, SeriesFill> = HashMap::new();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut records = Vec::with_capacity(dated.len());

    for (date, row) in dated {
        if !seen.insert((row.state.clone(), date)) {
            duplicates += 1;
            continue;
        }

        let point = row.point();
        for (metric, value) in [
            (Metric::Confirmed, point.confirmed),
            (Metric::Recovered, point.recovered),
            (Metric::Deaths, point.deaths),
        ] {
            if let Some(value) = value.filter(|v| *v < 0) {
                return Err(ParseError::InvalidCount {
                    name: format!("{} {}", row.state, metric),
                    date: date.to_string(),
                    value: value.to_string(),
                });
            }
        }

        let counts = fills.entry(row.state.clone()).or_default().fill(&point);
        records.push(CaseRecord::new(NATIONAL_REGION, Some(row.state), date, counts));
    }

    if duplicates > 0 {
        debug!(duplicates, "Dropped repeated state/date rows");
    }

    Ok(records)
}
