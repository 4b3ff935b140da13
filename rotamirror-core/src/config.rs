//! rotamirror configuration.
//!
//! Sources, lowest precedence first:
//!   1. TOML file (`rotamirror.toml` unless a path is given)
//!   2. `ROTAMIRROR_*` environment variables, `__` between nested keys
//!      (e.g. `ROTAMIRROR_OPSGENIE__API_KEY`)
//!   3. The deployment variables `OPS_GENIE_API_KEY`, `SERVICE_ACCOUNT_JSON`
//!      and `CALENDAR_ID`
//!
//! Every credential and identifier is required; a missing one stops the run
//! before anything is touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::event::Rotation;
use crate::identity::{DEFAULT_MAX_ID_LEN, IdentityMapper};
use crate::reconcile::ReconcilePolicy;
use crate::sync::SyncPlan;
use crate::window::{DEFAULT_HORIZON_DAYS, DEFAULT_LOOKBACK_DAYS, MAX_WINDOW_DAYS, MirrorWindow};

pub const DEFAULT_CONFIG_FILE: &str = "rotamirror.toml";
pub const DEFAULT_OPSGENIE_API_URL: &str = "https://api.eu.opsgenie.com";

const ENV_PREFIX: &str = "ROTAMIRROR";

/// Deployment variables mapped onto config keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("OPS_GENIE_API_KEY", "opsgenie.api_key"),
    ("SERVICE_ACCOUNT_JSON", "google.service_account_json"),
    ("CALENDAR_ID", "calendar_id"),
];

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    calendar_id: Option<String>,
    lookback_days: Option<i64>,
    horizon_days: Option<i64>,
    max_id_len: Option<usize>,
    #[serde(default)]
    opsgenie: RawOpsgenie,
    #[serde(default)]
    google: RawGoogle,
    #[serde(default)]
    policy: ReconcilePolicy,
    #[serde(default)]
    rotations: Vec<RawRotation>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOpsgenie {
    api_key: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGoogle {
    service_account_json: Option<String>,
    service_account_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawRotation {
    name: Option<String>,
    schedule_id: Option<String>,
    /// Read the schedule id from this environment variable instead.
    schedule_id_env: Option<String>,
    color: Option<String>,
}

/// OpsGenie access for schedule feeds.
#[derive(Clone)]
pub struct OpsgenieConfig {
    pub api_key: String,
    pub api_url: String,
}

impl std::fmt::Debug for OpsgenieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsgenieConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Validated configuration for a run.
#[derive(Clone)]
pub struct MirrorConfig {
    pub calendar_id: String,
    pub opsgenie: OpsgenieConfig,
    /// Service account key, as downloaded from the Google Cloud console.
    pub service_account_json: String,
    pub rotations: Vec<Rotation>,
    pub lookback_days: i64,
    pub horizon_days: i64,
    pub mapper: IdentityMapper,
    pub policy: ReconcilePolicy,
}

impl std::fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("calendar_id", &self.calendar_id)
            .field("opsgenie", &self.opsgenie)
            .field("service_account_json", &"<redacted>")
            .field("rotations", &self.rotations)
            .field("lookback_days", &self.lookback_days)
            .field("horizon_days", &self.horizon_days)
            .field("mapper", &self.mapper)
            .field("policy", &self.policy)
            .finish()
    }
}

impl MirrorConfig {
    /// Load from the given file (required) or `rotamirror.toml` (optional),
    /// plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Load with an explicit environment instead of the process one.
    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        Self::build(file, env)
    }

    /// Parse TOML text plus an explicit environment.
    pub fn from_toml_str(toml: &str, env: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(File::from_str(toml, FileFormat::Toml), env)
    }

    fn build<S>(file: S, env: HashMap<String, String>) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(env.clone())),
        );

        for (var, key) in LEGACY_ENV {
            builder = builder
                .set_override_option(*key, env.get(*var).cloned())
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }

        let raw: RawConfig = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        Self::validate(raw, &env)
    }

    fn validate(raw: RawConfig, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let calendar_id = required(raw.calendar_id, "calendar_id")?;
        let api_key = required(raw.opsgenie.api_key, "opsgenie.api_key")?;
        let api_url = raw
            .opsgenie
            .api_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPSGENIE_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let service_account_json = match (
            raw.google.service_account_json.filter(|s| !s.trim().is_empty()),
            raw.google.service_account_file,
        ) {
            (Some(json), _) => json,
            (None, Some(path)) => {
                std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?
            }
            (None, None) => {
                return Err(ConfigError::Missing(
                    "google.service_account_json or google.service_account_file".into(),
                ));
            }
        };

        if raw.rotations.is_empty() {
            return Err(ConfigError::Missing("rotations".into()));
        }
        let rotations = raw
            .rotations
            .into_iter()
            .enumerate()
            .map(|(i, rotation)| resolve_rotation(i, rotation, env))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, rotation) in rotations.iter().enumerate() {
            if rotations[..i].iter().any(|r| r.name == rotation.name) {
                return Err(ConfigError::Invalid {
                    key: format!("rotations[{}].name", i),
                    reason: format!("duplicate rotation name '{}'", rotation.name),
                });
            }
        }

        let lookback_days = raw.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        if lookback_days < 0 {
            return Err(ConfigError::Invalid {
                key: "lookback_days".into(),
                reason: "must not be negative".into(),
            });
        }
        check_window_length("lookback_days", lookback_days)?;
        let horizon_days = raw.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);
        if horizon_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "horizon_days".into(),
                reason: "must be positive".into(),
            });
        }
        check_window_length("horizon_days", horizon_days)?;

        let mapper = IdentityMapper::new(raw.max_id_len.unwrap_or(DEFAULT_MAX_ID_LEN))?;

        Ok(MirrorConfig {
            calendar_id,
            opsgenie: OpsgenieConfig { api_key, api_url },
            service_account_json,
            rotations,
            lookback_days,
            horizon_days,
            mapper,
            policy: raw.policy,
        })
    }

    pub fn window(&self, now: DateTime<Utc>) -> MirrorWindow {
        MirrorWindow::from_days(now, self.lookback_days, self.horizon_days)
    }

    pub fn plan(&self, now: DateTime<Utc>) -> SyncPlan {
        SyncPlan {
            rotations: self.rotations.clone(),
            window: self.window(now),
            mapper: self.mapper,
            policy: self.policy,
        }
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn resolve_rotation(
    index: usize,
    raw: RawRotation,
    env: &HashMap<String, String>,
) -> Result<Rotation, ConfigError> {
    let name = required(raw.name, &format!("rotations[{}].name", index))?;

    let schedule_id = match (raw.schedule_id, raw.schedule_id_env) {
        (Some(id), _) => Some(id),
        (None, Some(var)) => env.get(&var).cloned(),
        (None, None) => None,
    };
    let schedule_id = required(schedule_id, &format!("rotations[{}].schedule_id", index))?;

    let color = raw
        .color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(Rotation {
        name,
        schedule_id,
        color,
    })
}

fn check_window_length(key: &str, days: i64) -> Result<(), ConfigError> {
    if days > MAX_WINDOW_DAYS {
        return Err(ConfigError::Invalid {
            key: key.into(),
            reason: format!("must be at most {} days", MAX_WINDOW_DAYS),
        });
    }
    Ok(())
}
