//! Ingestion run orchestration
//!
//! fetch (bounded concurrency) -> parse -> reconcile -> optional JSON
//! artifacts -> publish. The first fetch, parse or publish failure aborts
//! the run; the live tables are only touched by the final publish step.
//! Artifacts are a convenience copy, so failing to write them is logged and
//! the snapshot is still published.

use crate::error::{FetchError, IngestError, ParseError, Result};
use crate::fetcher::CachedFetcher;
use crate::models::{PolicyRow, Snapshot, StateDailyRow};
use crate::parser::{DelimitedParser, Grid, GridParser, JsonParser, SourceParser};
use crate::publisher::{PublishStats, SnapshotPublisher};
use crate::reconcile::{reconcile, ParsedSources};
use crate::sources::{SourceCatalog, SourceKind};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Artifact file holding the reconciled case records
pub const CASE_ARTIFACT: &str = "case-data.json";

/// Artifact file holding the reconciled intervention records
pub const INTERVENTION_ARTIFACT: &str = "intervention-data.json";

/// Raw text of every source, as downloaded or read from the cache
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    pub states_daily: String,
    pub national_confirmed: String,
    pub national_recovered: String,
    pub national_deaths: String,
    pub state_policy: String,
}

impl RawSources {
    pub fn insert(&mut self, kind: SourceKind, body: String) {
        let slot = match kind {
            SourceKind::StatesDaily => &mut self.states_daily,
            SourceKind::NationalConfirmed => &mut self.national_confirmed,
            SourceKind::NationalRecovered => &mut self.national_recovered,
            SourceKind::NationalDeaths => &mut self.national_deaths,
            SourceKind::StatePolicy => &mut self.state_policy,
        };
        *slot = body;
    }

    /// Run each source through the parser suited to its format
    pub fn parse(&self) -> std::result::Result<ParsedSources, ParseError> {
        let grid = GridParser::default();

        Ok(ParsedSources {
            states: JsonParser::<StateDailyRow>::new()
                .parse(SourceKind::StatesDaily.name(), &self.states_daily)?,
            national_confirmed: grid
                .parse(SourceKind::NationalConfirmed.name(), &self.national_confirmed)?,
            national_recovered: grid
                .parse(SourceKind::NationalRecovered.name(), &self.national_recovered)?,
            national_deaths: grid.parse(SourceKind::NationalDeaths.name(), &self.national_deaths)?,
            policies: DelimitedParser::<PolicyRow>::new()
                .parse(SourceKind::StatePolicy.name(), &self.state_policy)?,
        })
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    /// Data rows per source, headers excluded
    pub source_rows: Vec<(SourceKind, usize)>,
    pub case_records: usize,
    pub intervention_records: usize,
    pub published: PublishStats,
    pub artifacts_written: bool,
    pub duration_seconds: f64,
}

/// Data rows each parsed source contributed
pub fn source_rows(parsed: &ParsedSources) -> Vec<(SourceKind, usize)> {
    let grid_rows = |grid: &Grid| grid.len().saturating_sub(1);

    vec![
        (SourceKind::StatesDaily, parsed.states.len()),
        (SourceKind::NationalConfirmed, grid_rows(&parsed.national_confirmed)),
        (SourceKind::NationalRecovered, grid_rows(&parsed.national_recovered)),
        (SourceKind::NationalDeaths, grid_rows(&parsed.national_deaths)),
        (SourceKind::StatePolicy, parsed.policies.len()),
    ]
}

pub struct IngestPipeline {
    sources: SourceCatalog,
    fetcher: CachedFetcher,
    concurrency: usize,
}

impl IngestPipeline {
    pub fn new(sources: SourceCatalog, fetcher: CachedFetcher, concurrency: usize) -> Self {
        Self {
            sources,
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Download every source, at most `concurrency` at a time
    pub async fn fetch_all(&self) -> std::result::Result<RawSources, FetchError> {
        info!(
            sources = SourceKind::ALL.len(),
            concurrency = self.concurrency,
            "Fetching sources"
        );

        let bodies: Vec<(SourceKind, String)> = stream::iter(SourceKind::ALL)
            .map(|kind| async move {
                let body = self.fetcher.fetch(self.sources.url(kind)).await?;
                Ok::<_, FetchError>((kind, body))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut raw = RawSources::default();
        for (kind, body) in bodies {
            raw.insert(kind, body);
        }
        Ok(raw)
    }

    /// Fetch, parse and reconcile without touching the database
    pub async fn build_snapshot(&self) -> Result<Snapshot> {
        Ok(self.collect().await?.0)
    }

    async fn collect(&self) -> Result<(Snapshot, Vec<(SourceKind, usize)>)> {
        let raw = self.fetch_all().await?;

        let parsed = raw.parse()?;
        let rows = source_rows(&parsed);
        for (kind, count) in &rows {
            info!(source = %kind, rows = count, "Parsed source");
        }

        Ok((reconcile(parsed)?, rows))
    }

    /// Full run ending in an atomic publish
    pub async fn run(&self, publisher: &SnapshotPublisher) -> Result<PipelineStats> {
        let start = Instant::now();

        let (snapshot, source_rows) = self.collect().await?;

        let artifacts_written = match self.fetcher.cache_dir() {
            Some(dir) => dump_artifacts(dir, &snapshot).await,
            None => false,
        };

        publisher.migrate().await?;
        let published = publisher
            .publish(&snapshot.cases, &snapshot.interventions)
            .await?;

        let stats = PipelineStats {
            source_rows,
            case_records: snapshot.cases.len(),
            intervention_records: snapshot.interventions.len(),
            published,
            artifacts_written,
            duration_seconds: start.elapsed().as_secs_f64(),
        };

        info!(
            case_records = stats.case_records,
            intervention_records = stats.intervention_records,
            artifacts_written = stats.artifacts_written,
            duration_seconds = stats.duration_seconds,
            "Ingestion run complete"
        );

        Ok(stats)
    }
}

/// Write the artifacts, logging instead of failing; returns whether both landed
pub async fn dump_artifacts(dir: &Path, snapshot: &Snapshot) -> bool {
    match write_artifacts(dir, snapshot).await {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to write snapshot artifacts; publishing anyway");
            false
        },
    }
}

/// Write both record sets as JSON arrays into `dir`
pub async fn write_artifacts(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| IngestError::Artifact {
            path: dir.to_path_buf(),
            source,
        })?;

    write_json(dir.join(CASE_ARTIFACT), &snapshot.cases).await?;
    write_json(dir.join(INTERVENTION_ARTIFACT), &snapshot.interventions).await?;

    info!(dir = %dir.display(), "Wrote snapshot artifacts");
    Ok(())
}

async fn write_json<T: Serialize>(path: PathBuf, records: &[T]) -> Result<()> {
    let body = serde_json::to_vec(records)?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| IngestError::Artifact { path, source })
}
