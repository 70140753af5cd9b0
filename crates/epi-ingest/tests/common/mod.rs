//! Shared helpers for the ingest integration tests
//!
//! - [`TestPostgres`]: throwaway PostgreSQL container (needs Docker)
//! - source fixtures and [`mount_sources`] for serving them from wiremock

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use epi_ingest::sources::{SourceCatalog, SourceKind};
use reqwest::Url;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    /// Start an empty PostgreSQL 16 container; no migrations are applied
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn count(&self, table: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap();
        count
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        let (name,): (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::text")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .unwrap();
        name.is_some()
    }

    /// Names of every `_import` / `_old` table left in the public schema
    pub async fn swap_leftovers(&self) -> Vec<String> {
        sqlx::query_scalar(
            r"SELECT tablename::text FROM pg_tables
              WHERE schemaname = 'public'
                AND (tablename LIKE '%\_import' OR tablename LIKE '%\_old')
              ORDER BY tablename",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }
}

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,epi_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Source fixtures
// ============================================================================

/// Two states, out of date order, with gaps in every metric
pub const STATES_DAILY_JSON: &str = r#"[
  {"date": 20200302, "state": "WA", "positive": 18, "death": null},
  {"date": 20200301, "state": "WA", "positive": 9, "death": 1},
  {"date": 20200301, "state": "OR", "positive": 3},
  {"date": 20200303, "state": "WA", "recovered": 1, "death": 9}
]"#;

pub const NATIONAL_CONFIRMED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20
Ontario,Canada,51.25,-85.32,1,2,3
,US,37.09,-95.71,30,53,80
";

pub const NATIONAL_RECOVERED_CSV: &str = "\
Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20
,US,37.09,-95.71,0,7,
";

pub const NATIONAL_DEATHS_CSV: &str = "\
Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20
,US,37.09,-95.71,1,6,11
";

/// Two usable rows; one lacks a policy and one a start date
pub const STATE_POLICY_CSV: &str = "\
StatePostal,StateName,StatePolicy,Mandate,StateWide,DateIssued,DateEnacted,DateExpiry,DateEased,DateEnded,PolicyCodingNotes,PolicySource
WA,Washington,SchoolClose,1,1,20200313,20200317,,,,\"Closed K-12, including private schools\",https://example.org/wa
OR,Oregon,StayAtHome,1,1,20200323,20200323,20200501,20200515,,,
NY,New York,,1,1,,20200322,,,,missing policy,
TX,Texas,GathRestrict,1,1,20200321,,,,,no start date,
";

/// Case records the fixtures reconcile to: 4 state + 3 national
pub const FIXTURE_CASE_RECORDS: usize = 7;

pub const FIXTURE_INTERVENTION_RECORDS: usize = 2;

pub fn fixture_body(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::StatesDaily => STATES_DAILY_JSON,
        SourceKind::NationalConfirmed => NATIONAL_CONFIRMED_CSV,
        SourceKind::NationalRecovered => NATIONAL_RECOVERED_CSV,
        SourceKind::NationalDeaths => NATIONAL_DEATHS_CSV,
        SourceKind::StatePolicy => STATE_POLICY_CSV,
    }
}

/// Path component under which `catalog` expects `kind`
pub fn source_path(catalog: &SourceCatalog, kind: SourceKind) -> String {
    Url::parse(catalog.url(kind)).unwrap().path().to_string()
}

/// Serve every fixture, each expected to be requested `expected_hits` times
pub async fn mount_sources(server: &MockServer, expected_hits: u64) -> SourceCatalog {
    let catalog = SourceCatalog::rooted_at(&server.uri());

    for kind in SourceKind::ALL {
        Mock::given(method("GET"))
            .and(path(source_path(&catalog, kind)))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture_body(kind)))
            .expect(expected_hits)
            .named(kind.name())
            .mount(server)
            .await;
    }

    catalog
}
