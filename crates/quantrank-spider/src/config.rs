use crate::error::{Error, Result};
use crate::metrics::fetch::{MetricGroup, METRIC_GROUPS};
use dotenv::var;
use std::str::FromStr;
use std::time::Duration;
use tracing::trace;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string; only required when persisting to the database.
    pub database_url: Option<String>,

    /// Minimum plausible screener result count.
    pub min_count: u64,
    pub page_size: u32,

    /// Restart the session before every page that is a multiple of this.
    pub restart_every: u32,
    pub request_delay: Duration,
    pub request_timeout: Duration,

    pub state_file: String,
    pub user_agent: Option<String>,

    pub base_url: String,
    pub groups: Vec<MetricGroup>,

    pub identity_table: String,
    pub ratings_table: String,
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        let base_url = "https://seekingalpha.com".to_string();
        Self {
            database_url: None,
            min_count: 3000,
            page_size: 100,
            restart_every: 5,
            request_delay: Duration::from_millis(150),
            request_timeout: Duration::from_secs(30),
            state_file: "state.json".to_string(),
            user_agent: None,
            groups: default_groups(&base_url),
            base_url,
            identity_table: "assets".to_string(),
            ratings_table: "seeking_alpha".to_string(),
            output_dir: "./buffer".to_string(),
        }
    }
}

impl Config {
    /// Read the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let base_url = var("API_BASE_URL").unwrap_or(defaults.base_url);
        let mut groups = default_groups(&base_url);
        for (i, group) in groups.iter_mut().enumerate() {
            if let Ok(url) = var(format!("METRIC_GROUP_{}_URL", i + 1)) {
                trace!("overriding metric group {} url: {url}", group.name);
                group.url = url;
            }
        }

        Ok(Self {
            database_url: var("DATABASE_URL").ok(),
            min_count: parse_var("SCREENER_MIN_COUNT", defaults.min_count)?,
            page_size: parse_var("SCREENER_PAGE_SIZE", defaults.page_size)?,
            restart_every: parse_var("SESSION_RESTART_EVERY", defaults.restart_every)?,
            request_delay: Duration::from_millis(parse_var(
                "REQUEST_DELAY_MS",
                defaults.request_delay.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            state_file: var("SESSION_STATE_FILE").unwrap_or(defaults.state_file),
            user_agent: var("USER_AGENT").ok(),
            base_url,
            groups,
            identity_table: var("IDENTITY_TABLE").unwrap_or(defaults.identity_table),
            ratings_table: var("RATINGS_TABLE").unwrap_or(defaults.ratings_table),
            output_dir: var("OUTPUT_DIR").unwrap_or(defaults.output_dir),
        })
        .and_then(Self::checked)
    }

    pub fn listing_url(&self) -> String {
        format!("{}/screeners", self.base_url)
    }

    pub fn screener_url(&self) -> String {
        format!("{}/api/v3/screener_results", self.base_url)
    }

    fn checked(self) -> Result<Self> {
        if self.page_size == 0 {
            return Err(Error::Config("SCREENER_PAGE_SIZE must be positive".into()));
        }
        if self.restart_every == 0 {
            return Err(Error::Config(
                "SESSION_RESTART_EVERY must be positive".into(),
            ));
        }
        Ok(self)
    }
}

fn default_groups(base_url: &str) -> Vec<MetricGroup> {
    METRIC_GROUPS
        .iter()
        .map(|&(name, path)| MetricGroup {
            name,
            url: format!("{base_url}{path}"),
        })
        .collect()
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[test]
fn defaults_cover_every_group() {
    let config = Config::default();
    assert_eq!(config.groups.len(), 12);
    assert!(config.groups[0]
        .url
        .starts_with("https://seekingalpha.com/api/v3/metrics?"));
    assert_eq!(
        config.screener_url(),
        "https://seekingalpha.com/api/v3/screener_results"
    );
    assert_eq!(config.min_count, 3000);
}

#[test]
fn zero_page_size_is_rejected() {
    let config = Config {
        page_size: 0,
        ..Config::default()
    };
    assert!(matches!(config.checked(), Err(Error::Config(_))));
}
