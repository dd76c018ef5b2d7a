use crate::analyzers::efficiency::AllocationMix;
use crate::error::{RaterError, RaterResult};
use crate::record::SalesMethod;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "SALES_RATER_CONFIG";

/// On-disk layout of the config file. Every key is optional:
/// ```json
/// {
///   "time_cost_minutes": { "Email": 2, "Call": 30, "Email + Call": 12 },
///   "allocation_mix": { "Email + Call": 0.9, "Email": 0.1 },
///   "max_reject_rate": 0.05,
///   "first_week": 1,
///   "last_week": 6,
///   "max_tenure_years": 41
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    time_cost_minutes: BTreeMap<String, f64>,
    allocation_mix: BTreeMap<String, f64>,
    max_reject_rate: f64,
    first_week: u32,
    last_week: u32,
    max_tenure_years: u32,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            time_cost_minutes: BTreeMap::from([
                ("Email".to_string(), 2.0),
                ("Call".to_string(), 30.0),
                ("Email + Call".to_string(), 12.0),
            ]),
            allocation_mix: BTreeMap::from([
                ("Email + Call".to_string(), 0.9),
                ("Email".to_string(), 0.1),
            ]),
            max_reject_rate: 0.05,
            first_week: 1,
            last_week: 6,
            max_tenure_years: 41,
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct RaterConfig {
    /// Minutes of team time spent per customer, by method.
    pub time_cost: BTreeMap<SalesMethod, f64>,
    /// Target allocation mix used for the blended ratio.
    pub allocation_mix: AllocationMix,
    pub max_reject_rate: f64,
    pub first_week: u32,
    pub last_week: u32,
    pub max_tenure_years: u32,
}

impl Default for RaterConfig {
    fn default() -> Self {
        // The built-in values always validate.
        match Self::from_file(ConfigFile::default()) {
            Ok(config) => config,
            Err(e) => unreachable!("built-in config is invalid: {e}"),
        }
    }
}

impl RaterConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> RaterResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(content: &str) -> RaterResult<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;
        Self::from_file(file)
    }

    /// Picks the config file from the CLI flag, then the environment, then
    /// falls back to the built-in defaults.
    pub fn resolve(cli_path: Option<&str>) -> RaterResult<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok();
        match cli_path.map(str::to_string).or(env_path) {
            Some(path) => {
                info!(path = %path, "Loading config");
                Self::load(&path)
            }
            None => {
                debug!("No config file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn from_file(file: ConfigFile) -> RaterResult<Self> {
        let mut time_cost = BTreeMap::new();
        for (label, minutes) in &file.time_cost_minutes {
            let method = normalize_key("time_cost_minutes", label)?;
            if !minutes.is_finite() || *minutes <= 0.0 {
                return Err(RaterError::config(
                    "time_cost_minutes",
                    format!("time cost for {method} must be positive, got {minutes}"),
                ));
            }
            if time_cost.insert(method, *minutes).is_some() {
                return Err(RaterError::config(
                    "time_cost_minutes",
                    format!("{method} is listed more than once"),
                ));
            }
        }

        let mut weights = BTreeMap::new();
        for (label, weight) in &file.allocation_mix {
            let method = normalize_key("allocation_mix", label)?;
            if weights.insert(method, *weight).is_some() {
                return Err(RaterError::config(
                    "allocation_mix",
                    format!("{method} is listed more than once"),
                ));
            }
        }
        let allocation_mix = AllocationMix::new(weights)?;

        if !(0.0..=1.0).contains(&file.max_reject_rate) {
            return Err(RaterError::config(
                "max_reject_rate",
                format!("must be within [0, 1], got {}", file.max_reject_rate),
            ));
        }

        if file.first_week > file.last_week {
            return Err(RaterError::config(
                "first_week",
                format!(
                    "first week {} is after last week {}",
                    file.first_week, file.last_week
                ),
            ));
        }

        Ok(RaterConfig {
            time_cost,
            allocation_mix,
            max_reject_rate: file.max_reject_rate,
            first_week: file.first_week,
            last_week: file.last_week,
            max_tenure_years: file.max_tenure_years,
        })
    }

    /// Fails unless every method in `methods` has a time cost.
    pub fn require_time_costs(
        &self,
        methods: impl IntoIterator<Item = SalesMethod>,
    ) -> RaterResult<()> {
        for method in methods {
            if !self.time_cost.contains_key(&method) {
                return Err(RaterError::config(
                    "time_cost_minutes",
                    format!("no time cost configured for {method}"),
                ));
            }
        }
        Ok(())
    }

    /// Weeks covered by the experiment, in order.
    pub fn weeks(&self) -> impl Iterator<Item = u32> {
        self.first_week..=self.last_week
    }
}

fn normalize_key(field: &str, label: &str) -> RaterResult<SalesMethod> {
    SalesMethod::normalize(label)
        .ok_or_else(|| RaterError::config(field, format!("unknown sales method '{label}'")))
}
