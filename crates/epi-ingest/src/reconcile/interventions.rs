//! Intervention records from the state policy source

use crate::dates;
use crate::error::ParseError;
use crate::models::{InterventionRecord, PolicyRow, NATIONAL_REGION};
use chrono::NaiveDate;
use tracing::debug;

/// Emit one record per row that names a policy, a state and an enactment date.
///
/// Rows missing any of the three are skipped. Every other field is `None`
/// when blank.
pub fn reconcile_interventions(
    rows: Vec<PolicyRow>,
) -> Result<Vec<InterventionRecord>, ParseError> {
    let total = rows.len();
    let mut records = Vec::with_capacity(total);

    for row in rows {
        let (Some(policy), Some(subregion), Some(start)) = (
            present(row.state_policy),
            present(row.state_postal),
            present(row.date_enacted),
        ) else {
            continue;
        };

        records.push(InterventionRecord {
            region_id: NATIONAL_REGION.to_string(),
            subregion_id: subregion,
            policy,
            notes: present(row.policy_coding_notes),
            source: present(row.policy_source),
            issue_date: optional_date(row.date_issued)?,
            start_date: dates::parse_policy_date(&start)?,
            ease_date: optional_date(row.date_eased)?,
            expiration_date: optional_date(row.date_expiry)?,
            end_date: optional_date(row.date_ended)?,
        });
    }

    debug!(
        kept = records.len(),
        skipped = total - records.len(),
        "Filtered intervention rows"
    );

    Ok(records)
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_date(value: Option<String>) -> Result<Option<NaiveDate>, ParseError> {
    present(value)
        .map(|v| dates::parse_policy_date(&v))
        .transpose()
}
