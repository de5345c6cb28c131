//! Configuration management for pilot.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/pilot/config.json`
//! 2. Environment variable: `PILOT_CONFIG_CONTENT`
//! 3. Project config: `pilot.jsonc` or `pilot.json` in the workspace root
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use pilot_provider::ClientConfig;
use pilot_state::{IgnoreRules, DEFAULT_IGNORE, DEFAULT_MAX_FILE_SIZE};
use pilot_util::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable holding inline config content.
pub const CONFIG_CONTENT_ENV: &str = "PILOT_CONFIG_CONTENT";

/// Project config file names, in order of preference.
pub const PROJECT_CONFIG_FILES: &[&str] = &["pilot.jsonc", "pilot.json"];

/// Probe timeout when none is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider used when no `llm` section is configured at all.
const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Project id the history is stored under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// LLM providers, keyed by provider id.
    ///
    /// Absent means the default provider; an empty map means none at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<BTreeMap<String, LlmConfig>>,

    /// Timeout of each reachability probe, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,

    /// Which workspace files are tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceConfig>,
}

/// One LLM provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key. Falls back to `<PROVIDER>_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// HTTP timeout per request, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// Merge another provider config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            model: other.model.or(self.model),
            api_key: other.api_key.or(self.api_key),
            base_url: other.base_url.or(self.base_url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }
}

/// Workspace scanning configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Extra glob patterns to ignore, on top of the defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,

    /// Files larger than this many bytes are not tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/pilot/`
    /// 2. `PILOT_CONFIG_CONTENT` environment variable
    /// 3. Project config from the workspace root
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        Self::load_from(Self::global_config_dir().as_deref(), project_dir).await
    }

    /// Load configuration with an explicit global config directory.
    pub async fn load_from(
        global_dir: Option<&Path>,
        project_dir: Option<&Path>,
    ) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = global_dir {
            for name in &["config.json", "config.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var(CONFIG_CONTENT_ENV) {
            let content = Self::substitute_variables(&content, Path::new("."))?;
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            for name in PROJECT_CONFIG_FILES {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        tracing::debug!(sources = ?sources, "Loaded configuration");
        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix systems, prefers `~/.config/pilot` (XDG standard) over
    /// the platform-specific directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("pilot");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        pilot_util::path::config_dir()
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip `//` and `/* */` comments outside of strings.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if in_string {
                match c {
                    '\\' => escape_next = true,
                    '"' => in_string = false,
                    _ => {}
                }
                result.push(c);
                continue;
            }

            let next = chars.peek().copied();
            match (c, next) {
                ('"', _) => {
                    in_string = true;
                    result.push(c);
                }
                ('/', Some('/')) => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                ('/', Some('*')) => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Keep line numbers stable for parse errors.
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                }
                _ => result.push(c),
            }
        }

        result
    }

    /// Substitute `{env:VAR}` and `{file:path}` references.
    ///
    /// File references are resolved relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex().captures_iter(content) {
            let (Some(full_match), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => std::env::var(value).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value);
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        if other.project.is_some() {
            self.project = other.project;
        }
        if other.probe_timeout_secs.is_some() {
            self.probe_timeout_secs = other.probe_timeout_secs;
        }

        self.llm = match (self.llm, other.llm) {
            (Some(mut base), Some(other)) => {
                for (provider, config) in other {
                    let merged = match base.remove(&provider) {
                        Some(existing) => existing.merge(config),
                        None => config,
                    };
                    base.insert(provider, merged);
                }
                Some(base)
            }
            (base, None) => base,
            (None, other) => other,
        };

        self.workspace = match (self.workspace, other.workspace) {
            (Some(base), Some(other)) => Some(WorkspaceConfig {
                ignore: other.ignore.or(base.ignore),
                max_file_size: other.max_file_size.or(base.max_file_size),
            }),
            (base, None) => base,
            (None, other) => other,
        };

        self
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_secs == Some(0) {
            return Err(ConfigError::validation("probe_timeout_secs must be positive"));
        }
        if let Some(llm) = &self.llm {
            for (provider, config) in llm {
                if config.model.as_deref().is_some_and(str::is_empty) {
                    return Err(ConfigError::validation(format!(
                        "llm.{provider}.model must not be empty"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Replace the API key of every configured provider.
    pub fn override_api_key(&mut self, api_key: &str) {
        let llm = self.llm.get_or_insert_with(default_llm);
        for config in llm.values_mut() {
            config.api_key = Some(api_key.to_string());
        }
    }

    /// Client configurations for every configured provider.
    pub fn client_configs(&self) -> Vec<ClientConfig> {
        let llm = self.llm.clone().unwrap_or_else(default_llm);

        llm.into_iter()
            .map(|(provider, config)| ClientConfig {
                model: config
                    .model
                    .unwrap_or_else(|| default_model(&provider).to_string()),
                api_key: config.api_key,
                base_url: config.base_url,
                timeout: config.timeout_secs.map(Duration::from_secs),
                provider,
            })
            .collect()
    }

    /// Timeout applied to each reachability probe.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    /// The project id, falling back to the workspace directory name.
    pub fn project_id(&self, root: &Path) -> String {
        self.project
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| {
                root.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "default".to_string())
    }

    /// Ignore rules for scanning the workspace.
    pub fn ignore_rules(&self) -> IgnoreRules {
        let workspace = self.workspace.clone().unwrap_or_default();
        IgnoreRules::new(
            DEFAULT_IGNORE.iter().copied(),
            workspace.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE),
        )
        .with_patterns(PROJECT_CONFIG_FILES.iter().copied())
        .with_patterns(workspace.ignore.unwrap_or_default())
    }
}

fn default_llm() -> BTreeMap<String, LlmConfig> {
    BTreeMap::from([(
        DEFAULT_PROVIDER.to_string(),
        LlmConfig {
            model: Some(DEFAULT_MODEL.to_string()),
            ..Default::default()
        },
    )])
}

fn default_model(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "claude-3-5-sonnet-latest",
        _ => DEFAULT_MODEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // Line comment
            "key": "value", // trailing comment
            /* block comment */
            "key2": "val/*not a comment*/ue",
            "url": "http://localhost:8080/v1"
        }"#;

        let result = Config::strip_comments(input);
        assert!(!result.contains("Line comment"));
        assert!(!result.contains("trailing comment"));
        assert!(!result.contains("block comment"));
        assert!(result.contains("val/*not a comment*/ue"));
        assert!(result.contains("http://localhost:8080/v1"));
    }

    #[test]
    fn test_parse_jsonc() {
        let input = r#"{
            // This is a comment
            "project": "todo-app",
            "log_level": "debug",
            "llm": { "anthropic": { "model": "claude-test" } }
        }"#;

        let config = Config::parse_jsonc(input, "test").unwrap();
        assert_eq!(config.project.as_deref(), Some("todo-app"));
        assert_eq!(config.log_level, Some(LogLevel::Debug));
        assert_eq!(config.client_configs()[0].model, "claude-test");
    }

    #[test]
    fn test_invalid_json_names_source() {
        let err = Config::parse_jsonc("{ nope", "pilot.json").unwrap_err();
        assert!(err.to_string().contains("pilot.json"));
    }

    #[test]
    fn test_merge_config() {
        let base = Config {
            project: Some("one".to_string()),
            llm: Some(BTreeMap::from([(
                "openai".to_string(),
                LlmConfig {
                    model: Some("gpt-4o".to_string()),
                    api_key: Some("sk-global".to_string()),
                    ..Default::default()
                },
            )])),
            ..Default::default()
        };

        let other = Config {
            log_level: Some(LogLevel::Warn),
            llm: Some(BTreeMap::from([(
                "openai".to_string(),
                LlmConfig {
                    model: Some("gpt-4o-mini".to_string()),
                    ..Default::default()
                },
            )])),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.project.as_deref(), Some("one"));
        assert_eq!(merged.log_level, Some(LogLevel::Warn));

        let openai = &merged.llm.unwrap()["openai"];
        assert_eq!(openai.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(openai.api_key.as_deref(), Some("sk-global"));
    }

    #[test]
    fn test_default_and_empty_llm() {
        let config = Config::default();
        let clients = config.client_configs();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].provider, "openai");

        let none = Config {
            llm: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert!(none.client_configs().is_empty());
    }

    #[test]
    fn test_override_api_key() {
        let mut config = Config::parse_jsonc(
            r#"{"llm": {"openai": {}, "anthropic": {"api_key": "old"}}}"#,
            "test",
        )
        .unwrap();
        config.override_api_key("new");

        let clients = config.client_configs();
        assert_eq!(clients.len(), 2);
        assert!(clients.iter().all(|c| c.api_key.as_deref() == Some("new")));
        assert_eq!(clients[0].model, "claude-3-5-sonnet-latest");
    }

    #[test]
    fn test_validate() {
        let config = Config {
            probe_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_project_id_fallback() {
        let config = Config::default();
        assert_eq!(config.project_id(Path::new("/work/my-app")), "my-app");

        let named = Config {
            project: Some("named".into()),
            ..Default::default()
        };
        assert_eq!(named.project_id(Path::new("/work/my-app")), "named");
    }

    #[test]
    fn test_ignore_rules() {
        let config = Config::parse_jsonc(
            r#"{"workspace": {"ignore": ["*.lock"], "max_file_size": 10}}"#,
            "test",
        )
        .unwrap();
        let rules = config.ignore_rules();
        assert!(rules.ignores_path("poetry.lock"));
        assert!(rules.ignores_path("node_modules/x.js"));
        assert_eq!(rules.max_file_size(), 10);
    }

    #[test]
    fn test_substitute_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("key.txt"), "sk-from-file\n").unwrap();
        let config_path = dir.path().join("pilot.json");

        let result =
            Config::substitute_variables(r#"{"api_key": "{file:key.txt}"}"#, &config_path).unwrap();
        assert_eq!(result, r#"{"api_key": "sk-from-file"}"#);

        let err = Config::substitute_variables("{file:missing.txt}", &config_path).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_missing_env_reference() {
        let err = Config::substitute_variables("{env:PILOT_TEST_SURELY_UNSET_VAR}", Path::new("x"))
            .unwrap_err();
        assert!(err.to_string().contains("PILOT_TEST_SURELY_UNSET_VAR"));
    }

    #[tokio::test]
    async fn test_load_precedence() {
        let global = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        std::fs::write(
            global.path().join("config.json"),
            r#"{"project": "global", "probe_timeout_secs": 5}"#,
        )
        .unwrap();
        std::fs::write(
            project.path().join("pilot.jsonc"),
            "{\n  // project wins\n  \"project\": \"local\"\n}",
        )
        .unwrap();

        let (config, sources) = Config::load_from(Some(global.path()), Some(project.path()))
            .await
            .unwrap();

        assert_eq!(config.project.as_deref(), Some("local"));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_ignore_rules_cover_config_files() {
        let config = Config {
            workspace: Some(WorkspaceConfig {
                ignore: Some(vec!["*.bak".to_string()]),
                max_file_size: Some(10),
            }),
            ..Default::default()
        };

        let rules = config.ignore_rules();
        assert!(rules.ignores_path("pilot.json"));
        assert!(rules.ignores_path("pilot.jsonc"));
        assert!(rules.ignores_path("notes.bak"));
        assert!(!rules.ignores_path("main.py"));
        assert_eq!(rules.max_file_size(), 10);
    }
}
