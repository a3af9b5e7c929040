// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Toolkit Configuration Types
//
// Defines the configuration schema for the Tessera toolkit:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Mail service endpoint and identity used to fetch and publish threads
// - Merge policy (per-section maximum item counts)
// - Lint policy (per-section minimum live item counts)
// - Observability settings

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::section::Section;

pub const CONFIG_API_VERSION: &str = "100monkeys.ai/v1";
pub const CONFIG_KIND: &str = "ToolkitConfig";
pub const CONFIG_PATH_ENV: &str = "TESSERA_CONFIG_PATH";

/// Where a configuration file candidate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Flag,
    Environment,
    WorkingDirectory,
    Home,
    System,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigOrigin::Flag => "--config flag",
            ConfigOrigin::Environment => CONFIG_PATH_ENV,
            ConfigOrigin::WorkingDirectory => "working directory",
            ConfigOrigin::Home => "user home",
            ConfigOrigin::System => "system",
        })
    }
}

/// Top-level Kubernetes-style toolkit configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ToolkitConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ToolkitConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable name of the lab / project this config belongs to
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolkitConfigSpec {
    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub merge: MergePolicy,

    #[serde(default)]
    pub lint: LintPolicy,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Base URL of the mail service
    #[serde(default = "default_mail_endpoint")]
    pub endpoint: String,

    /// Project key threads are stored under
    #[serde(default = "default_project")]
    pub project: String,

    /// Agent name used when publishing compiled artifacts
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Bearer token (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            endpoint: default_mail_endpoint(),
            project: default_project(),
            sender: default_sender(),
            api_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl MailConfig {
    /// Resolve `api_token`, expanding `env:VAR_NAME` references.
    pub fn resolved_token(&self) -> Option<String> {
        let raw = self.api_token.as_ref()?;
        match raw.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok().filter(|v| !v.is_empty()),
            None => Some(raw.clone()),
        }
    }
}

/// Section cardinality limits enforced while merging.
///
/// A limit caps the live items of a section. Killed items stay in the
/// artifact but free their slot, so a killed item can be replaced by a new ADD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    #[serde(default = "default_section_limits")]
    pub section_limits: BTreeMap<Section, usize>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            section_limits: default_section_limits(),
        }
    }
}

impl MergePolicy {
    /// No limits at all.
    pub fn unbounded() -> Self {
        Self {
            section_limits: BTreeMap::new(),
        }
    }

    pub fn limit(&self, section: Section) -> Option<usize> {
        self.section_limits.get(&section).copied()
    }
}

/// Minimum live item counts checked after merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintPolicy {
    #[serde(default = "default_section_minimums")]
    pub minimums: BTreeMap<Section, usize>,
}

impl Default for LintPolicy {
    fn default() -> Self {
        Self {
            minimums: default_section_minimums(),
        }
    }
}

impl LintPolicy {
    pub fn minimum(&self, section: Section) -> usize {
        self.minimums.get(&section).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_mail_endpoint() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_project() -> String {
    "default".to_string()
}

fn default_sender() -> String {
    "Compiler".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_section_limits() -> BTreeMap<Section, usize> {
    BTreeMap::from([
        (Section::ResearchThread, 1),
        (Section::HypothesisSlate, 6),
    ])
}

fn default_section_minimums() -> BTreeMap<Section, usize> {
    BTreeMap::from([
        (Section::ResearchThread, 1),
        (Section::HypothesisSlate, 3),
        (Section::PredictionsTable, 1),
        (Section::DiscriminativeTests, 2),
        (Section::AssumptionLedger, 1),
        (Section::AdversarialCritique, 2),
    ])
}

impl Default for ToolkitConfigManifest {
    fn default() -> Self {
        Self {
            api_version: CONFIG_API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            metadata: ManifestMetadata {
                name: "tessera".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ToolkitConfigSpec::default(),
        }
    }
}

impl ToolkitConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate config files in precedence order. `cli_path` wins outright.
    pub fn candidate_paths(cli_path: Option<PathBuf>) -> Vec<(ConfigOrigin, PathBuf)> {
        if let Some(path) = cli_path {
            return vec![(ConfigOrigin::Flag, path)];
        }

        let mut candidates = Vec::new();
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            candidates.push((ConfigOrigin::Environment, PathBuf::from(path)));
        }
        candidates.push((ConfigOrigin::WorkingDirectory, PathBuf::from("./tessera-config.yaml")));
        if let Some(home) = dirs::home_dir() {
            candidates.push((ConfigOrigin::Home, home.join(".tessera").join("config.yaml")));
        }
        #[cfg(unix)]
        candidates.push((ConfigOrigin::System, PathBuf::from("/etc/tessera/config.yaml")));
        #[cfg(windows)]
        candidates.push((ConfigOrigin::System, PathBuf::from("C:\\ProgramData\\Tessera\\config.yaml")));
        candidates
    }

    /// Load the first config file found, or defaults when there is none.
    ///
    /// An explicit `cli_path` must exist. Discovered paths are skipped when
    /// absent. Environment overrides apply either way.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = cli_path.is_some();
        let found = Self::candidate_paths(cli_path)
            .into_iter()
            .find(|(_, path)| explicit || path.exists());

        let mut config = match found {
            Some((origin, path)) => {
                tracing::info!(origin = %origin, path = %path.display(), "Loading configuration");
                Self::from_yaml_file(&path)
                    .with_context(|| format!("Failed to load config at {}", path.display()))?
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TESSERA_MAIL_*` environment overrides. Blank values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let mail = &mut self.spec.mail;
        for (var, target) in [
            ("TESSERA_MAIL_ENDPOINT", &mut mail.endpoint),
            ("TESSERA_MAIL_PROJECT", &mut mail.project),
        ] {
            if let Some(value) = std::env::var(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                tracing::info!("Environment override: {}={}", var, value);
                *target = value;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != CONFIG_API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                CONFIG_API_VERSION
            );
        }

        if self.kind != CONFIG_KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, CONFIG_KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mail = &self.spec.mail;
        if !(mail.endpoint.starts_with("http://") || mail.endpoint.starts_with("https://")) {
            anyhow::bail!(
                "spec.mail.endpoint must be an http(s) URL, got '{}'",
                mail.endpoint
            );
        }

        if mail.project.is_empty() {
            anyhow::bail!("spec.mail.project cannot be empty");
        }

        if mail.sender.is_empty() {
            anyhow::bail!("spec.mail.sender cannot be empty");
        }

        for (section, limit) in &self.spec.merge.section_limits {
            if *limit == 0 {
                anyhow::bail!("spec.merge.section_limits.{} must be at least 1", section);
            }
            let minimum = self.spec.lint.minimum(*section);
            if minimum > *limit {
                anyhow::bail!(
                    "spec.lint.minimums.{} ({}) exceeds spec.merge.section_limits.{} ({})",
                    section,
                    minimum,
                    section,
                    limit
                );
            }
        }

        Ok(())
    }
}
