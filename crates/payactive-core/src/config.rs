//! Run configuration from environment variables
//!
//! Every required setting is checked before any store client is built, and all
//! problems are reported together.

use std::path::PathBuf;

use crate::channels::IdScheme;
use crate::error::ConfigError;

pub const DEFAULT_PAYING_USERS_INDEX: &str = "paying-users";
pub const DEFAULT_ACTIVE_PAYING_USERS_INDEX: &str = "active-paying-users";

/// Load `.env` from the working directory (silently ignored if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticSettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Where login logs are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginSource {
    S3(S3Settings),
    Local(PathBuf),
}

/// Settings the pipeline itself consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub paying_users_index: String,
    pub active_paying_users_index: String,
    pub key_prefix: String,
    pub login_event: String,
    pub id_scheme: IdScheme,
    /// Append the day to output document ids instead of overwriting per segment.
    pub key_by_day: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub job: JobSettings,
    pub elastic: ElasticSettings,
    pub login_source: LoginSource,
}

struct Collector<F> {
    lookup: F,
    missing: Vec<&'static str>,
    invalid: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> Collector<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// A default applies only when the variable is unset; set-but-empty is missing.
    fn required(&mut self, key: &'static str, default: Option<&str>) -> String {
        let value = match (self.lookup)(key) {
            Some(v) => Some(v.trim().to_string()).filter(|v| !v.is_empty()),
            None => default.map(str::to_string),
        };
        value.unwrap_or_else(|| {
            self.missing.push(key);
            String::new()
        })
    }

    fn flag(&mut self, key: &str) -> bool {
        match self.optional(key).map(|v| v.to_lowercase()).as_deref() {
            None | Some("0") | Some("false") | Some("no") => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some(other) => {
                self.invalid.push(format!("{}={} (expected true or false)", key, other));
                false
            }
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut c = Collector {
            lookup,
            missing: Vec::new(),
            invalid: Vec::new(),
        };

        let url = c.required("ES_HOST", None);
        let paying_users_index = c.required("ES_PAYING_USERS_INDEX", Some(DEFAULT_PAYING_USERS_INDEX));
        let active_paying_users_index =
            c.required("ES_ACTIVE_PAYING_USERS_INDEX", Some(DEFAULT_ACTIVE_PAYING_USERS_INDEX));
        let key_prefix = c.required("S3_KEY_PREFIX", None);
        let login_event = c.required("PLAYER_LOGIN_EVENT", None);

        let login_source = match c.optional("LOGIN_LOG_DIR") {
            Some(dir) => LoginSource::Local(PathBuf::from(dir)),
            None => LoginSource::S3(S3Settings {
                bucket: c.required("S3_BUCKET", None),
                region: c.optional("AWS_REGION"),
                endpoint: c.optional("S3_ENDPOINT"),
            }),
        };

        let id_scheme = match c.optional("PAYING_USER_ID_SCHEME") {
            None => IdScheme::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                c.invalid.push(format!("PAYING_USER_ID_SCHEME: {}", e));
                IdScheme::default()
            }),
        };
        let key_by_day = c.flag("ACTIVE_PAYING_USERS_KEY_BY_DAY");

        let elastic = ElasticSettings {
            url,
            username: c.optional("ES_USERNAME"),
            password: c.optional("ES_PASSWORD"),
        };

        if !c.missing.is_empty() || !c.invalid.is_empty() {
            return Err(ConfigError {
                missing: c.missing,
                invalid: c.invalid,
            });
        }

        Ok(Self {
            job: JobSettings {
                paying_users_index,
                active_paying_users_index,
                key_prefix,
                login_event,
                id_scheme,
                key_by_day,
            },
            elastic,
            login_source,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings:");
        tracing::info!(
            "  search:   host={}, auth={}",
            self.elastic.url,
            if self.elastic.username.is_some() { "basic" } else { "none" }
        );
        tracing::info!(
            "  indices:  paying={}, output={}",
            self.job.paying_users_index,
            self.job.active_paying_users_index
        );
        match &self.login_source {
            LoginSource::S3(s3) => tracing::info!(
                "  logins:   s3://{}/{} (event {})",
                s3.bucket,
                self.job.key_prefix,
                self.job.login_event
            ),
            LoginSource::Local(dir) => tracing::info!(
                "  logins:   {}/{} (event {})",
                dir.display(),
                self.job.key_prefix,
                self.job.login_event
            ),
        }
        tracing::info!(
            "  ids:      scheme={}, key_by_day={}",
            self.job.id_scheme,
            self.job.key_by_day
        );
    }
}
