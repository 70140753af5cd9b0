//! Snapshot publisher
//!
//! Replaces the contents of the live tables without readers ever seeing a
//! partial snapshot. For each table:
//!
//! 1. `CREATE TABLE <t>_import (LIKE <t> INCLUDING ALL)`
//! 2. bulk insert every record into `<t>_import`
//! 3. `<t>` -> `<t>_old`, `<t>_import` -> `<t>` in one statement batch
//! 4. drop `<t>_old` and any leftover `<t>_import`
//!
//! Steps 1-3 for both tables run in a single transaction. PostgreSQL DDL is
//! transactional and the renames hold an exclusive lock until commit, so
//! readers see either the previous pair of tables or the new pair. Step 4
//! runs after the transaction whatever its outcome; it is also run before
//! step 1 to clear debris from an interrupted earlier run.

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::models::{CaseRecord, InterventionRecord};
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info, warn};

/// Suffix of the table a new snapshot is built in
pub const IMPORT_SUFFIX: &str = "_import";

/// Suffix the replaced live table carries until it is dropped
pub const OLD_SUFFIX: &str = "_old";

/// A record type stored in its own live table
pub trait SnapshotTable {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Bind this record's values in `COLUMNS` order
    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

impl SnapshotTable for CaseRecord {
    const TABLE: &'static str = "case_data";
    const COLUMNS: &'static [&'static str] = &[
        "region_id",
        "subregion_id",
        "date",
        "confirmed",
        "recovered",
        "deaths",
    ];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.region_id)
            .push_bind(&self.subregion_id)
            .push_bind(self.date)
            .push_bind(self.confirmed)
            .push_bind(self.recovered)
            .push_bind(self.deaths);
    }
}

impl SnapshotTable for InterventionRecord {
    const TABLE: &'static str = "intervention_data";
    const COLUMNS: &'static [&'static str] = &[
        "region_id",
        "subregion_id",
        "policy",
        "notes",
        "source",
        "issue_date",
        "start_date",
        "ease_date",
        "expiration_date",
        "end_date",
    ];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.region_id)
            .push_bind(&self.subregion_id)
            .push_bind(&self.policy)
            .push_bind(&self.notes)
            .push_bind(&self.source)
            .push_bind(self.issue_date)
            .push_bind(self.start_date)
            .push_bind(self.ease_date)
            .push_bind(self.expiration_date)
            .push_bind(self.end_date);
    }
}

/// Progress of one table through the swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    Idle,
    ShadowCreated,
    Populated,
    Swapped,
    CleanedUp,
}

/// Swap bookkeeping for one live table
#[derive(Debug)]
pub struct TableSwap {
    table: &'static str,
    state: SwapState,
}

impl TableSwap {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            state: SwapState::Idle,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub fn shadow_name(&self) -> String {
        format!("{}{}", self.table, IMPORT_SUFFIX)
    }

    pub fn retired_name(&self) -> String {
        format!("{}{}", self.table, OLD_SUFFIX)
    }

    fn advance(&mut self, next: SwapState) {
        debug!(table = self.table, from = ?self.state, to = ?next, "Swap state");
        self.state = next;
    }
}

impl Drop for TableSwap {
    fn drop(&mut self) {
        if !matches!(self.state, SwapState::Idle | SwapState::CleanedUp) {
            warn!(
                table = self.table,
                state = ?self.state,
                "Swap abandoned before cleanup; leftovers are dropped by the next run"
            );
        }
    }
}

/// Rows written per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub case_rows: usize,
    pub intervention_rows: usize,
}

pub struct SnapshotPublisher {
    pool: PgPool,
    chunk_size: usize,
}

impl SnapshotPublisher {
    pub fn new(pool: PgPool, config: &PublishConfig) -> Self {
        Self {
            pool,
            chunk_size: config.chunk_size.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the live tables if this database has never been published to
    pub async fn migrate(&self) -> Result<(), PublishError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Replace both live tables with the given records
    pub async fn publish(
        &self,
        cases: &[CaseRecord],
        interventions: &[InterventionRecord],
    ) -> Result<PublishStats, PublishError> {
        let mut swaps = [
            TableSwap::new(CaseRecord::TABLE),
            TableSwap::new(InterventionRecord::TABLE),
        ];

        for swap in &swaps {
            self.drop_leftovers(swap).await;
        }

        let outcome = self.swap_in(&mut swaps, cases, interventions).await;

        for swap in &mut swaps {
            self.cleanup(swap).await;
        }

        match &outcome {
            Ok(stats) => info!(
                case_rows = stats.case_rows,
                intervention_rows = stats.intervention_rows,
                "Snapshot published"
            ),
            Err(e) => warn!(error = %e, "Snapshot publish aborted; live tables unchanged"),
        }

        outcome
    }

    async fn swap_in(
        &self,
        swaps: &mut [TableSwap; 2],
        cases: &[CaseRecord],
        interventions: &[InterventionRecord],
    ) -> Result<PublishStats, PublishError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| PublishError::Transaction {
                step: "begin",
                source,
            })?;

        match self.stage_and_rename(&mut tx, swaps, cases, interventions).await {
            Ok(stats) => {
                tx.commit()
                    .await
                    .map_err(|source| PublishError::Transaction {
                        step: "commit",
                        source,
                    })?;
                Ok(stats)
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            },
        }
    }

    async fn stage_and_rename(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        swaps: &mut [TableSwap; 2],
        cases: &[CaseRecord],
        interventions: &[InterventionRecord],
    ) -> Result<PublishStats, PublishError> {
        let [case_swap, intervention_swap] = swaps;

        let case_rows = self.stage(tx, case_swap, cases).await?;
        let intervention_rows = self.stage(tx, intervention_swap, interventions).await?;

        self.rename(tx, case_swap).await?;
        self.rename(tx, intervention_swap).await?;

        Ok(PublishStats {
            case_rows,
            intervention_rows,
        })
    }

    /// Create the shadow table and fill it
    async fn stage<T: SnapshotTable>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        swap: &mut TableSwap,
        rows: &[T],
    ) -> Result<usize, PublishError> {
        let shadow = swap.shadow_name();

        let create = format!("CREATE TABLE {} (LIKE {} INCLUDING ALL)", shadow, T::TABLE);
        sqlx::raw_sql(&create)
            .execute(&mut **tx)
            .await
            .map_err(|source| PublishError::Table {
                table: T::TABLE,
                step: "create shadow table",
                source,
            })?;
        swap.advance(SwapState::ShadowCreated);

        let inserted = self
            .insert_rows(tx, &shadow, rows)
            .await
            .map_err(|source| PublishError::Table {
                table: T::TABLE,
                step: "bulk insert",
                source,
            })?;
        swap.advance(SwapState::Populated);

        Ok(inserted)
    }

    async fn insert_rows<T: SnapshotTable>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        rows: &[T],
    ) -> Result<usize, sqlx::Error> {
        let total_chunks = rows.len().div_ceil(self.chunk_size);

        for (chunk_idx, chunk) in rows.chunks(self.chunk_size).enumerate() {
            debug!(
                table,
                chunk = chunk_idx + 1,
                total_chunks,
                rows = chunk.len(),
                "Inserting chunk"
            );

            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table,
                T::COLUMNS.join(", ")
            ));
            query_builder.push_values(chunk, |mut b, row| row.push_row(&mut b));
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(rows.len())
    }

    /// Retire the live table and put the shadow in its place
    async fn rename(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        swap: &mut TableSwap,
    ) -> Result<(), PublishError> {
        let sql = format!(
            "ALTER TABLE {live} RENAME TO {old}; ALTER TABLE {shadow} RENAME TO {live};",
            live = swap.table(),
            old = swap.retired_name(),
            shadow = swap.shadow_name(),
        );
        sqlx::raw_sql(&sql)
            .execute(&mut **tx)
            .await
            .map_err(|source| PublishError::Table {
                table: swap.table(),
                step: "rename",
                source,
            })?;
        swap.advance(SwapState::Swapped);
        Ok(())
    }

    async fn cleanup(&self, swap: &mut TableSwap) {
        self.drop_leftovers(swap).await;
        swap.advance(SwapState::CleanedUp);
    }

    /// Drop the retired and shadow tables; failures are logged, never raised
    async fn drop_leftovers(&self, swap: &TableSwap) {
        for name in [swap.retired_name(), swap.shadow_name()] {
            let sql = format!("DROP TABLE IF EXISTS {}", name);
            if let Err(e) = sqlx::raw_sql(&sql).execute(&self.pool).await {
                warn!(table = %name, error = %e, "Cleanup of swap table failed");
            }
        }
    }
}
