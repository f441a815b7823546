use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Per-service-instance sizing, supplied by configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceAllocation {
    #[serde(default)]
    pub nodes: u32,
    #[serde(default)]
    pub cores: f64,
    #[serde(default)]
    pub memory_gb: f64,
    #[serde(default)]
    pub disk_gb: f64,
    #[serde(default)]
    pub bandwidth_gb: f64,
}

/// IaaS unit prices for one region, in dollars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSheet {
    #[serde(default)]
    pub per_core: f64,
    #[serde(default)]
    pub per_gb_memory: f64,
    #[serde(default)]
    pub per_gb_disk: f64,
    #[serde(default)]
    pub per_gb_bandwidth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub region: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// assignment group → service names. A service may appear in more than
    /// one group; its cost contributions sum.
    #[serde(default)]
    pub assignments: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub level: u8,
    /// Domains probed by this service's availability checks.
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub resources: ResourceAllocation,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_event_log")]
    pub event_log: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_sla_threshold")]
    pub sla_threshold: f64,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_event_log() -> PathBuf {
    PathBuf::from("events.jsonl")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_sla_threshold() -> f64 {
    crate::core::billing::sla::DEFAULT_SLA_THRESHOLD
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            event_log: default_event_log(),
            log_level: default_log_level(),
            sla_threshold: default_sla_threshold(),
        }
    }
}

/// A point-in-time view of the billable network: who hosts what, at which
/// prices. The engine never holds on to one across refresh cycles.
#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    pub members: BTreeMap<String, MemberConfig>,
    pub services: BTreeMap<String, ServiceConfig>,
    pub pricing: BTreeMap<String, PriceSheet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub members: BTreeMap<String, MemberConfig>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub pricing: BTreeMap<String, PriceSheet>,
}

impl AppConfig {
    /// Load config from an explicit path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to `path`, creating parent dirs.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// The network view handed to the billing engine on each refresh.
    pub fn network(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            members: self.members.clone(),
            services: self.services.clone(),
            pricing: self.pricing.clone(),
        }
    }

    /// A small starter config with one member, one service and one region.
    pub fn sample() -> Self {
        let mut members = BTreeMap::new();
        members.insert(
            "metanodes".to_string(),
            MemberConfig {
                region: "europe".to_string(),
                active: true,
                assignments: BTreeMap::from([(
                    "rpc".to_string(),
                    vec!["chain-rpc".to_string()],
                )]),
            },
        );
        let mut services = BTreeMap::new();
        services.insert(
            "chain-rpc".to_string(),
            ServiceConfig {
                active: true,
                level: 3,
                domains: vec!["rpc.example.net".to_string()],
                resources: ResourceAllocation {
                    nodes: 2,
                    cores: 8.0,
                    memory_gb: 32.0,
                    disk_gb: 500.0,
                    bandwidth_gb: 1000.0,
                },
            },
        );
        let mut pricing = BTreeMap::new();
        pricing.insert(
            "europe".to_string(),
            PriceSheet {
                per_core: 8.0,
                per_gb_memory: 2.0,
                per_gb_disk: 0.1,
                per_gb_bandwidth: 0.02,
            },
        );
        Self {
            settings: Settings::default(),
            members,
            services,
            pricing,
        }
    }

    /// Validate the config, returning human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !(0.0..=100.0).contains(&self.settings.sla_threshold) {
            issues.push(format!(
                "Invalid sla_threshold: {} (must be between 0 and 100)",
                self.settings.sla_threshold
            ));
        }

        let regions: Vec<String> = self.pricing.keys().map(|r| normalize_key(r)).collect();
        let services: Vec<String> = self.services.keys().map(|s| normalize_key(s)).collect();

        for (id, member) in &self.members {
            if !regions.contains(&normalize_key(&member.region)) {
                issues.push(format!(
                    "Member '{}': region '{}' has no pricing entry",
                    id, member.region
                ));
            }
            for names in member.assignments.values() {
                for name in names {
                    if !services.contains(&normalize_key(name)) {
                        issues.push(format!(
                            "Member '{}': unknown service '{}' assigned",
                            id, name
                        ));
                    }
                }
            }
        }

        for (region, sheet) in &self.pricing {
            let prices = [
                sheet.per_core,
                sheet.per_gb_memory,
                sheet.per_gb_disk,
                sheet.per_gb_bandwidth,
            ];
            if prices.iter().any(|p| *p < 0.0) {
                issues.push(format!("Pricing '{}': negative unit price", region));
            }
        }

        issues
    }
}

/// Canonical form for case-insensitive region and service lookup.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Point-in-time provider of the billable-network view. The file-backed
/// implementation re-reads its TOML on every call so configuration edits are
/// picked up by the next refresh cycle without a restart.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> Result<NetworkSnapshot, ConfigError>;
}

pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfigSource {
    fn snapshot(&self) -> Result<NetworkSnapshot, ConfigError> {
        Ok(AppConfig::load(&self.path)?.network())
    }
}
