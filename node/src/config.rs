use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use barrage_attack::AttackerConfig;
use barrage_loadtest::LayerOverrides;
use barrage_resolver::is_literal_url;
use barrage_types::{Conventions, LabelSet, TargetSpec};
use clap::ArgMatches;
use config::{Config, File as ConfigFile};
use serde::Deserialize;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Process configuration: TOML file, then `BARRAGE_*` environment, then CLI
/// flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub rate: Option<u64>,
    pub duration_ms: Option<u64>,
    pub listen: String,
    pub channel_capacity: usize,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_in_flight: usize,
    pub labels: Vec<String>,
    pub discovery_scheme: String,
    pub log_level: String,
    pub log_format: String,
    #[serde(rename = "test")]
    pub tests: BTreeMap<String, TestEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let attacker = AttackerConfig::default();
        Self {
            name: String::new(),
            rate: None,
            duration_ms: None,
            listen: String::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            request_timeout_ms: attacker.request_timeout.as_millis() as u64,
            connect_timeout_ms: attacker.connect_timeout.as_millis() as u64,
            max_in_flight: attacker.max_in_flight,
            labels: LabelSet::default()
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            discovery_scheme: "http".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            tests: BTreeMap::new(),
        }
    }
}

/// One `[test.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TestEntry {
    pub url: Option<String>,
    pub address: Option<String>,
    pub rate: Option<u64>,
    pub duration_ms: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl TestEntry {
    pub fn from_locator(locator: &str) -> Self {
        if is_literal_url(locator) {
            Self {
                url: Some(locator.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                address: Some(locator.to_string()),
                ..Self::default()
            }
        }
    }

    fn locator(&self, name: &str) -> Result<&str> {
        match (&self.url, &self.address) {
            (Some(url), None) => Ok(url),
            (None, Some(address)) => Ok(address),
            (Some(_), Some(_)) => bail!("test '{name}' sets both url and address; choose one"),
            (None, None) => bail!("test '{name}' needs either url or address"),
        }
    }
}

/// The `[test]` tables of a TOML file, read with their keys as written.
#[derive(Debug, Default, Deserialize)]
struct TestTables {
    #[serde(default)]
    test: BTreeMap<String, TestEntry>,
}

impl TestTables {
    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid test tables in {}", path.display()))
    }
}

/// A target ready to resolve and register.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub spec: TargetSpec,
    pub overrides: LayerOverrides,
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let mut case_preserved = None;
        if let Some(path) = config_path {
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
            // `config` lowercases every key; layer names and header names
            // must reach the load test as written.
            if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
                case_preserved = Some(TestTables::read(path)?);
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BARRAGE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("labels"),
        );

        let mut config: Self = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        if let Some(tables) = case_preserved {
            config.tests = tables.test;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("load test name must not be empty; set name in the config, BARRAGE_NAME or --name");
        }
        if self.listen.trim().is_empty() {
            bail!("listen address must not be empty; set listen in the config, BARRAGE_LISTEN or --listen");
        }
        if self.tests.is_empty() {
            bail!("no targets configured; add a [test.<name>] table or pass --target name:locator");
        }
        if self.rate == Some(0) {
            bail!("rate must be greater than zero");
        }
        if self.duration_ms == Some(0) {
            bail!("duration_ms must be greater than zero");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be greater than zero");
        }
        if self.max_in_flight == 0 {
            bail!("max_in_flight must be greater than zero");
        }
        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            bail!("request and connect timeouts must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!(
                "unknown log_format '{}', expected pretty or json",
                self.log_format
            );
        }
        self.label_set()?;

        for (name, entry) in &self.tests {
            entry.locator(name)?;
            if entry.rate == Some(0) {
                bail!("rate of test '{name}' must be greater than zero");
            }
            if entry.duration_ms == Some(0) {
                bail!("duration_ms of test '{name}' must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn label_set(&self) -> Result<LabelSet> {
        Ok(LabelSet::parse(&self.labels)?)
    }

    pub fn conventions(&self) -> Result<Conventions> {
        let mut conventions = Conventions::with_labels(self.label_set()?);
        conventions.discovery_scheme = self.discovery_scheme.clone();
        Ok(conventions)
    }

    pub fn attacker_config(&self) -> AttackerConfig {
        AttackerConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_in_flight: self.max_in_flight,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// Targets in name order.
    pub fn targets(&self) -> Result<Vec<TargetPlan>> {
        self.tests
            .iter()
            .map(|(name, entry)| {
                let locator = entry.locator(name)?;
                let mut overrides = LayerOverrides {
                    headers: entry.headers.clone(),
                    ..LayerOverrides::default()
                };
                overrides.rate = entry.rate;
                overrides.duration = entry.duration_ms.map(Duration::from_millis);
                Ok(TargetPlan {
                    spec: TargetSpec::new(name.clone(), locator),
                    overrides,
                })
            })
            .collect()
    }
}

pub fn load_config_with_overrides(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(matches: &ArgMatches, config: &mut AppConfig) {
    if let Some(name) = matches.get_one::<String>("name") {
        config.name = name.clone();
    }

    if let Some(listen) = matches.get_one::<String>("listen") {
        config.listen = listen.clone();
    }

    if let Some(rate) = matches.get_one::<u64>("rate") {
        config.rate = Some(*rate);
    }

    if let Some(duration_ms) = matches.get_one::<u64>("duration-ms") {
        config.duration_ms = Some(*duration_ms);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    // A CLI target replaces a file target of the same name.
    if let Some(targets) = matches.get_many::<TargetSpec>("target") {
        for target in targets {
            config
                .tests
                .insert(target.name.clone(), TestEntry::from_locator(&target.locator));
        }
    }
}
