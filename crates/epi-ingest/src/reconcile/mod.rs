//! Reconciliation of parsed sources into the canonical record sets
//!
//! - [`states`]: per-state JSON series, sorted by date then forward-filled
//! - [`national`]: three single-metric grids merged per date for the
//!   aggregate national row
//! - [`interventions`]: policy rows filtered to complete records
//!
//! State records always carry a subregion and national records never do,
//! so the two case sets are concatenated without deduplication.

pub mod interventions;
pub mod national;
pub mod states;

pub use interventions::reconcile_interventions;
pub use national::reconcile_national;
pub use states::reconcile_states;

use crate::error::ParseError;
use crate::models::{Counts, PolicyRow, RawSeriesPoint, Snapshot, StateDailyRow};
use crate::parser::Grid;
use tracing::info;

/// Everything the reconciliation step consumes, already parsed
#[derive(Debug, Clone, Default)]
pub struct ParsedSources {
    pub states: Vec<StateDailyRow>,
    pub national_confirmed: Grid,
    pub national_recovered: Grid,
    pub national_deaths: Grid,
    pub policies: Vec<PolicyRow>,
}

/// Build both canonical record sets
pub fn reconcile(sources: ParsedSources) -> Result<Snapshot, ParseError> {
    let ParsedSources {
        states,
        national_confirmed,
        national_recovered,
        national_deaths,
        policies,
    } = sources;

    let mut cases = reconcile_states(states)?;
    let state_records = cases.len();

    let national = reconcile_national(&national_confirmed, &national_recovered, &national_deaths)?;
    let national_records = national.len();
    cases.extend(national);

    let interventions = reconcile_interventions(policies)?;

    info!(
        state_records,
        national_records,
        intervention_records = interventions.len(),
        "Reconciliation complete"
    );

    Ok(Snapshot {
        cases,
        interventions,
    })
}

/// Last-known-value carry for one metric, starting at zero
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricFill {
    last: Option<i64>,
}

impl MetricFill {
    pub fn next(&mut self, value: Option<i64>) -> i64 {
        if value.is_some() {
            self.last = value;
        }
        self.last.unwrap_or(0)
    }
}

/// Forward-fill of all three metrics of one series, fed in date order
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesFill {
    confirmed: MetricFill,
    recovered: MetricFill,
    deaths: MetricFill,
}

impl SeriesFill {
    pub fn fill(&mut self, point: &RawSeriesPoint) -> Counts {
        Counts {
            confirmed: self.confirmed.next(point.confirmed),
            recovered: self.recovered.next(point.recovered),
            deaths: self.deaths.next(point.deaths),
        }
    }
}

/// Forward-fill a single chronologically ordered sequence
pub fn forward_fill(values: &[Option<i64>]) -> Vec<i64> {
    let mut fill = MetricFill::default();
    values.iter().map(|v| fill.next(*v)).collect()
}
