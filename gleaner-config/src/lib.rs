//! Loader for Gleaner configuration with YAML + environment overlays.
//!
//! Sources merge in this order, later ones winning:
//!
//! 1. built-in defaults (every section of [`GleanerConfig`] is optional)
//! 2. YAML files or inline snippets, in the order they were added
//! 3. `GLEANER_`-prefixed environment variables, with `__` between path
//!    segments (`GLEANER_LLM__MODEL=llama3.2`, `GLEANER_FETCH__MODE=browser`)
//!
//! String values may reference the process environment as `${VAR}` or
//! `$VAR`. Expansion is applied after merging and follows nested references
//! up to [`MAXIMUM_ENV_EXPANSION_DEPTH`] hops; unknown variables are left
//! untouched.
use config::{Config, ConfigError, Environment, File};
use gleaner_common::observability::{LogConfig, LogFormat};
use gleaner_common::{FetchConfig, LlmConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Conventional file name searched for by [`default_config_path`].
pub const CONFIG_FILE_NAME: &str = "gleaner.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GleanerConfig {
    pub llm: LlmConfig,
    pub fetch: FetchConfig,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

impl GleanerConfig {
    /// Render the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: 6000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Extra attempts per chunk on transient model errors.
    pub retries: usize,
    pub retry_backoff_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            dir: None,
            stderr: false,
            filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

/// First existing config file among `./gleaner.yaml` and
/// `<config dir>/gleaner/gleaner.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("gleaner").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => break,
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct GleanerConfigLoader {
    files: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for GleanerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GleanerConfigLoader {
    /// Start from defaults; environment overrides are applied at [`load`](Self::load).
    ///
    /// ```
    /// use gleaner_config::GleanerConfigLoader;
    ///
    /// let config = GleanerConfigLoader::new()
    ///     .with_yaml_str("chunking:\n  max_chunk_len: 1200")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.chunking.max_chunk_len, 1200);
    /// assert_eq!(config.llm.model, "gemma3:1b");
    /// ```
    pub fn new() -> Self {
        Self {
            files: Config::builder(),
        }
    }

    /// Attach a file that must exist; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files = self
            .files
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Attach whatever [`default_config_path`] finds, if anything.
    pub fn with_default_file(self) -> Self {
        match default_config_path() {
            Some(path) => self.with_file(path),
            None => self,
        }
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.files = self
            .files
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use gleaner_config::GleanerConfigLoader;
    ///
    /// unsafe { std::env::set_var("GLEANER_DOC_UA", "gleaner-doc/1.0"); }
    ///
    /// let config = GleanerConfigLoader::new()
    ///     .with_yaml_str("fetch:\n  user_agent: \"${GLEANER_DOC_UA}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.fetch.user_agent.as_deref(), Some("gleaner-doc/1.0"));
    ///
    /// unsafe { std::env::remove_var("GLEANER_DOC_UA"); }
    /// ```
    pub fn load(self) -> Result<GleanerConfig, ConfigError> {
        let cfg = self
            .files
            .add_source(
                Environment::with_prefix("GLEANER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${STATE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn cyclic_references_terminate() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        temp_env::with_var_unset("GLEANER_DOES_NOT_EXIST", || {
            let mut v = json!("hi-${GLEANER_DOES_NOT_EXIST}");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("hi-${GLEANER_DOES_NOT_EXIST}"));
        });
    }

    #[test]
    fn logging_section_maps_to_log_config() {
        let logging = LoggingConfig {
            format: LogFormat::Json,
            dir: Some(PathBuf::from("/tmp/gleaner-logs")),
            stderr: true,
            filter: "debug".into(),
        };
        let cfg = logging.log_config("gleaner");
        assert_eq!(cfg.app_name, "gleaner");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.emit_stderr);
        assert_eq!(cfg.default_filter, "debug");
        assert_eq!(cfg.log_dir.as_deref(), Some(Path::new("/tmp/gleaner-logs")));
    }

    #[test]
    fn defaults_render_as_yaml() {
        let yaml = GleanerConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("max_chunk_len: 6000"));
        assert!(yaml.contains("gemma3:1b"));
        assert!(!yaml.contains("user_agent"));
    }
}
