//! Canonical record shapes and the raw source rows they are built from

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Region code used for every US record, national and per-state
pub const NATIONAL_REGION: &str = "US";

// ============================================================================
// Canonical records
// ============================================================================

/// One day of cumulative counts for a region or subregion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    #[serde(rename = "regionID")]
    pub region_id: String,
    /// `None` for the national aggregate
    #[serde(rename = "subregionID")]
    pub subregion_id: Option<String>,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub recovered: i64,
    pub deaths: i64,
}

impl CaseRecord {
    pub fn new(
        region_id: impl Into<String>,
        subregion_id: Option<String>,
        date: NaiveDate,
        counts: Counts,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            subregion_id,
            date,
            confirmed: counts.confirmed,
            recovered: counts.recovered,
            deaths: counts.deaths,
        }
    }
}

/// A policy intervention issued for a subregion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    #[serde(rename = "regionID")]
    pub region_id: String,
    #[serde(rename = "subregionID")]
    pub subregion_id: String,
    pub policy: String,
    pub notes: Option<String>,
    pub source: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub ease_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Both canonical record sets produced by one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub cases: Vec<CaseRecord>,
    pub interventions: Vec<InterventionRecord>,
}

// ============================================================================
// Series values
// ============================================================================

/// The three tracked counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Confirmed,
    Recovered,
    Deaths,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Recovered => "recovered",
            Metric::Deaths => "deaths",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-date values as reported by a source, before gaps are filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawSeriesPoint {
    pub confirmed: Option<i64>,
    pub recovered: Option<i64>,
    pub deaths: Option<i64>,
}

impl RawSeriesPoint {
    pub fn set(&mut self, metric: Metric, value: Option<i64>) {
        match metric {
            Metric::Confirmed => self.confirmed = value,
            Metric::Recovered => self.recovered = value,
            Metric::Deaths => self.deaths = value,
        }
    }
}

/// Filled counts for one date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub confirmed: i64,
    pub recovered: i64,
    pub deaths: i64,
}

// ============================================================================
// Source rows
// ============================================================================

/// One state/day object of the state daily JSON feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateDailyRow {
    /// `YYYYMMDD`
    pub date: u32,
    pub state: String,
    #[serde(default)]
    pub positive: Option<i64>,
    #[serde(default)]
    pub recovered: Option<i64>,
    #[serde(default)]
    pub death: Option<i64>,
}

impl StateDailyRow {
    pub fn point(&self) -> RawSeriesPoint {
        RawSeriesPoint {
            confirmed: self.positive,
            recovered: self.recovered,
            deaths: self.death,
        }
    }
}

/// One row of the state policy CSV; unknown columns are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyRow {
    #[serde(rename = "StatePostal", default)]
    pub state_postal: Option<String>,
    #[serde(rename = "StatePolicy", default)]
    pub state_policy: Option<String>,
    #[serde(rename = "DateIssued", default)]
    pub date_issued: Option<String>,
    #[serde(rename = "DateEnacted", default)]
    pub date_enacted: Option<String>,
    #[serde(rename = "DateExpiry", default)]
    pub date_expiry: Option<String>,
    #[serde(rename = "DateEased", default)]
    pub date_eased: Option<String>,
    #[serde(rename = "DateEnded", default)]
    pub date_ended: Option<String>,
    #[serde(rename = "PolicyCodingNotes", default)]
    pub policy_coding_notes: Option<String>,
    #[serde(rename = "PolicySource", default)]
    pub policy_source: Option<String>,
}
