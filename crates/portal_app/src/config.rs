//! Environment configuration for both binaries.
//!
//! Parsing is a pure function over a variable lookup; [`ExtractorConfig::from_env`]
//! and [`WatcherConfig::from_env`] plug in the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use portal_core::{GroupId, RetryPolicy};
use portal_engine::{
    ExtractionSettings, InstrumentSource, WatcherSettings, WebDavSettings, DEFAULT_DUSTMAPS_BASE_URL,
    DEFAULT_PAGE_SIZE,
};
use thiserror::Error;

use crate::platform::slack::SlackSettings;

pub const DEFAULT_OWNCLOUD_BASE_URL: &str = "https://grandma-owncloud.lal.in2p3.fr/remote.php/dav/files";
pub const DEFAULT_SKYPORTAL_URL: &str = "https://skyportal-icare.ijclab.in2p3.fr";
pub const DEFAULT_SAVE_PATH: &str = "Candidates/Skyportal";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_WATCHER_GROUP_IDS: &str = "3";
pub const DEFAULT_SLACK_SERVICE_NAME: &str = "owncloud-folder-service";
pub const DEFAULT_TELESCOPE_LIST: &str = "TAROT-TCA,TAROT-TRE,TAROT-TCH,Les-Makes-T60,UBAI-NT-60,UBAI-ST-60,\
FRAM-CTA-N,FRAM-Auger,OHP-IRIS,AbAO-T150,VIRT,TRT-SBO,TRT-GAO,TRT-SRO,TRT-CTO,TNT,ShAO-T60,AbAO-T70,\
GMG-2.4,Xinglong-2.16m,OST-CDK,HAO,KAO,OPD-60cm";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("required environment variable missing: {var}")]
    Missing { var: &'static str },
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Loads `path` into the process environment, overriding existing variables.
///
/// Returns `false` when the file does not exist; any other failure is reported as an error.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    if !path.exists() {
        return Ok(false);
    }
    dotenvy::from_path_override(path)?;
    Ok(true)
}

/// Reads variables through `lookup`; empty values count as unset.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.optional(var).ok_or(ConfigError::Missing { var })
    }

    fn or_default(&self, var: &'static str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    let url = url::Url::parse(&value).map_err(|err| invalid(var, &value, err))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(var, &value, "expected an http(s) url"));
    }
    Ok(value)
}

fn parse_group_ids(var: &'static str, value: &str) -> Result<Vec<GroupId>, ConfigError> {
    let ids = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<GroupId>()
                .map_err(|err| invalid(var, value, format!("{part:?}: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(invalid(var, value, "no group ids"));
    }
    Ok(ids)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// ISO 8601 instant; naive values are taken as UTC, a bare date as midnight.
fn parse_instant(var: &'static str, value: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| invalid(var, value, "expected ISO 8601, e.g. 2025-10-20T00:00:00Z"))
}

/// Batch extractor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// API root, already ending in `/api`.
    pub base_url: String,
    pub api_token: String,
    pub group_ids: Vec<GroupId>,
    /// Passed through verbatim as `startDate` / `endDate`.
    pub saved_after: Option<String>,
    pub saved_before: Option<String>,
    pub max_retries: u32,
    pub dustmaps_dir: PathBuf,
    pub dustmaps_base_url: String,
}

impl ExtractorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let api_token = vars.required("SKYPORTAL_API_TOKEN")?;
        let base_url = parse_url("SKYPORTAL_BASE_URL", vars.required("SKYPORTAL_BASE_URL")?)?;
        let group_ids = parse_group_ids("GROUP_IDS", &vars.required("GROUP_IDS")?)?;

        let mut dates = [None, None];
        for (slot, var) in dates.iter_mut().zip(["SAVED_AFTER", "SAVED_BEFORE"]) {
            if let Some(value) = vars.optional(var) {
                parse_instant(var, &value)?;
                *slot = Some(value);
            }
        }
        let [saved_after, saved_before] = dates;

        let retries = vars.required("MAX_RETRIES")?;
        let max_retries = retries
            .parse::<u32>()
            .map_err(|err| invalid("MAX_RETRIES", &retries, err))?;
        if max_retries == 0 {
            return Err(invalid("MAX_RETRIES", &retries, "must be at least 1"));
        }

        let dustmaps_dir = PathBuf::from(vars.required("DUSTMAPS_DATA_DIR")?);
        let dustmaps_base_url = parse_url(
            "DUSTMAPS_BASE_URL",
            vars.or_default("DUSTMAPS_BASE_URL", DEFAULT_DUSTMAPS_BASE_URL),
        )?;

        Ok(Self {
            base_url,
            api_token,
            group_ids,
            saved_after,
            saved_before,
            max_retries,
            dustmaps_dir,
            dustmaps_base_url,
        })
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            group_ids: self.group_ids.clone(),
            num_per_page: DEFAULT_PAGE_SIZE,
            saved_after: self.saved_after.clone(),
            saved_before: self.saved_before.clone(),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
        }
    }
}

/// Source watcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub owncloud: WebDavSettings,
    pub skyportal_url: String,
    pub skyportal_token: String,
    pub poll_interval: Duration,
    pub group_ids: Vec<GroupId>,
    pub use_base_telescope_list: bool,
    pub telescope_list: Vec<String>,
    /// First poll window start; `None` means one day before startup.
    pub start_time: Option<DateTime<Utc>>,
    pub slack: Option<SlackSettings>,
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let owncloud = WebDavSettings {
            base_url: parse_url(
                "OWNCLOUD_BASE_URL",
                vars.or_default("OWNCLOUD_BASE_URL", DEFAULT_OWNCLOUD_BASE_URL),
            )?,
            username: vars.required("OWNCLOUD_USERNAME")?,
            token: vars.required("OWNCLOUD_TOKEN")?,
            user_id: vars.required("OWNCLOUD_USER_ID")?,
            save_path: vars.or_default("SAVE_PATH", DEFAULT_SAVE_PATH),
        };
        let skyportal_url = parse_url(
            "SKYPORTAL_URL",
            vars.or_default("SKYPORTAL_URL", DEFAULT_SKYPORTAL_URL),
        )?;
        let skyportal_token = vars.required("SKYPORTAL_TOKEN")?;

        let poll_interval = match vars.optional("POLL_INTERVAL") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|err| invalid("POLL_INTERVAL", &value, err))?,
            None => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        };
        let group_ids = parse_group_ids(
            "GROUP_IDS",
            &vars.or_default("GROUP_IDS", DEFAULT_WATCHER_GROUP_IDS),
        )?;
        let use_base_telescope_list = vars
            .or_default("USE_BASE_TELESCOPE_LIST", "true")
            .eq_ignore_ascii_case("true");
        let telescope_list = parse_list(&vars.or_default("TELESCOPE_LIST", DEFAULT_TELESCOPE_LIST));
        let start_time = vars
            .optional("START_TIME")
            .map(|value| parse_instant("START_TIME", &value))
            .transpose()?;
        let slack = vars.optional("SLACK_BOT_TOKEN").map(|token| SlackSettings {
            token,
            service_name: vars.or_default("SLACK_SERVICE_NAME", DEFAULT_SLACK_SERVICE_NAME),
        });

        Ok(Self {
            owncloud,
            skyportal_url,
            skyportal_token,
            poll_interval,
            group_ids,
            use_base_telescope_list,
            telescope_list,
            start_time,
            slack,
        })
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        let instruments = if self.use_base_telescope_list {
            InstrumentSource::BaseList(self.telescope_list.clone())
        } else {
            InstrumentSource::PerSource
        };
        WatcherSettings {
            group_ids: self.group_ids.clone(),
            poll_interval: self.poll_interval,
            instruments,
            ..WatcherSettings::default()
        }
    }

    /// `SKYPORTAL_URL` is the site root; the broker API lives under `/api`.
    pub fn api_root(&self) -> String {
        format!("{}/api", self.skyportal_url.trim_end_matches('/'))
    }

    pub fn start_time_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.start_time.unwrap_or(now - chrono::Duration::days(1))
    }
}

/// Parses a `--start-time` flag value like `START_TIME`.
pub fn parse_start_time(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    parse_instant("START_TIME", value.trim())
}
