//! The fixed set of remote sources a run downloads

use std::fmt;

/// State-level daily counts (JSON array)
pub const STATES_DAILY_URL: &str = "https://covidtracking.com/api/v1/states/daily.json";

/// National time series, one file per metric (simple CSV grid)
pub const NATIONAL_CONFIRMED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
pub const NATIONAL_RECOVERED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";
pub const NATIONAL_DEATHS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";

/// State policy interventions (quoted CSV)
pub const STATE_POLICY_URL: &str = "https://raw.githubusercontent.com/COVID19StatePolicy/SocialDistancing/master/data/USstatesCov19distancingpolicy.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    StatesDaily,
    NationalConfirmed,
    NationalRecovered,
    NationalDeaths,
    StatePolicy,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::StatesDaily,
        SourceKind::NationalConfirmed,
        SourceKind::NationalRecovered,
        SourceKind::NationalDeaths,
        SourceKind::StatePolicy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::StatesDaily => "states-daily",
            SourceKind::NationalConfirmed => "national-confirmed",
            SourceKind::NationalRecovered => "national-recovered",
            SourceKind::NationalDeaths => "national-deaths",
            SourceKind::StatePolicy => "state-policy",
        }
    }

    fn default_url(self) -> &'static str {
        match self {
            SourceKind::StatesDaily => STATES_DAILY_URL,
            SourceKind::NationalConfirmed => NATIONAL_CONFIRMED_URL,
            SourceKind::NationalRecovered => NATIONAL_RECOVERED_URL,
            SourceKind::NationalDeaths => NATIONAL_DEATHS_URL,
            SourceKind::StatePolicy => STATE_POLICY_URL,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// URL for each source kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCatalog {
    states_daily: String,
    national_confirmed: String,
    national_recovered: String,
    national_deaths: String,
    state_policy: String,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::from_fn(|kind| kind.default_url().to_string())
    }
}

impl SourceCatalog {
    /// Same file names as the default catalogue, served from `base`
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self::from_fn(|kind| {
            let url = kind.default_url();
            let file = url.rsplit('/').next().unwrap_or(url);
            format!("{}/{}", base, file)
        })
    }

    fn from_fn(mut url_for: impl FnMut(SourceKind) -> String) -> Self {
        Self {
            states_daily: url_for(SourceKind::StatesDaily),
            national_confirmed: url_for(SourceKind::NationalConfirmed),
            national_recovered: url_for(SourceKind::NationalRecovered),
            national_deaths: url_for(SourceKind::NationalDeaths),
            state_policy: url_for(SourceKind::StatePolicy),
        }
    }

    pub fn url(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::StatesDaily => &self.states_daily,
            SourceKind::NationalConfirmed => &self.national_confirmed,
            SourceKind::NationalRecovered => &self.national_recovered,
            SourceKind::NationalDeaths => &self.national_deaths,
            SourceKind::StatePolicy => &self.state_policy,
        }
    }
}
