use std::{
    env,
    error::Error,
    fmt::{Debug, Display},
    io,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use dotenvy::dotenv;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sql_query_core::translator::gemini::GeminiSettings;
use tracing::{info, warn};

const DATABASE_URL: &str = "DATABASE_URL";
const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const DEFAULT_CONFIG_FILE: &str = "sql-query.toml";

static URL_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<prefix>://[^:/@]*:)[^@/]*@")
        .expect("This is a bug in the regex crate as per documentation.")
});

#[derive(Debug)]
pub enum ConfigError {
    MissingDatabaseUrl,
    Read { path: PathBuf, error: io::Error },
    Parse { path: PathBuf, error: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingDatabaseUrl => write!(
                f,
                "Database URL not found, please set the {DATABASE_URL} environment variable or pass --database-url."
            ),
            ConfigError::Read { path, error } => write!(
                f,
                "encountered '{error}' attempting to read {}",
                path.display()
            ),
            ConfigError::Parse { path, error } => {
                write!(f, "invalid config file {}: {error}", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LlmOptions {
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InteractiveOptions {
    history_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[must_use]
pub struct TomlConfig {
    #[serde(default = "Default::default")]
    llm: LlmOptions,
    #[serde(default = "Default::default")]
    interactive: InteractiveOptions,
}

/// Values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Only needed for natural language queries, checked when one is made.
    pub api_key: Option<String>,
    pub gemini: GeminiSettings,
    pub history_file: Option<PathBuf>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &redact_url(&self.database_url))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini", &self.gemini)
            .field("history_file", &self.history_file)
            .finish()
    }
}

/// Hides the password part of a connection URL.
pub fn redact_url(url: &str) -> String {
    URL_PASSWORD.replace(url, "${prefix}***@").into_owned()
}

pub fn resolve(overrides: &Overrides) -> Result<Config, ConfigError> {
    if let Err(err) = dotenv() {
        if !err.not_found() {
            warn!("Could not load .env file: {err}");
        }
    }
    let file = read_config_file(overrides.config.as_deref())?;
    resolve_from(overrides, file, |key| env::var(key).ok())
}

fn read_config_file(path: Option<&Path>) -> Result<TomlConfig, ConfigError> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) if !explicit && error.kind() == io::ErrorKind::NotFound => {
            return Ok(TomlConfig::default());
        }
        Err(error) => return Err(ConfigError::Read { path, error }),
    };
    info!("Loaded config from {}", path.display());
    toml::from_str(&contents).map_err(|error| ConfigError::Parse { path, error })
}

fn resolve_from(
    overrides: &Overrides,
    file: TomlConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let present = |value: String| (!value.trim().is_empty()).then_some(value);

    let database_url = overrides
        .database_url
        .clone()
        .and_then(present)
        .or_else(|| env(DATABASE_URL).and_then(present))
        .ok_or(ConfigError::MissingDatabaseUrl)?;
    let api_key = env(GEMINI_API_KEY).and_then(present);
    if api_key.is_none() {
        info!("{GEMINI_API_KEY} is not set, natural language queries will fall back to SQL");
    }

    let defaults = GeminiSettings::default();
    let gemini = GeminiSettings {
        model: file.llm.model.unwrap_or(defaults.model),
        temperature: file.llm.temperature.unwrap_or(defaults.temperature),
        timeout: file
            .llm
            .timeout_secs
            .map_or(defaults.timeout, Duration::from_secs),
    };
    let history_file = file
        .interactive
        .history_file
        .map(|path| expand_home(path, env("HOME")));

    let config = Config {
        database_url,
        api_key,
        gemini,
        history_file,
    };
    info!("Resolved {config:?}");
    Ok(config)
}

fn expand_home(path: PathBuf, home: Option<String>) -> PathBuf {
    let Some(home) = home else {
        return path;
    };
    match path.strip_prefix("~") {
        Ok(rest) => Path::new(&home).join(rest),
        Err(_) => path,
    }
}
