use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const CONFIG_FILE_NAME: &str = "sat-trigger.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// What the post-build step runs, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub script: String,
    #[serde(
        default,
        alias = "runIfJobCodeBaseChanged",
        alias = "RunIfJobCodeBaseChanged"
    )]
    pub run_if_job_code_base_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
    #[serde(default = "default_true")]
    pub colors: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            colors: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl TriggerConfig {
    pub fn new(script: impl Into<String>, run_if_job_code_base_changed: bool) -> Self {
        Self {
            script: script.into(),
            run_if_job_code_base_changed,
        }
    }

    /// Binds submitted form data. Missing fields take their defaults, an
    /// unchecked box is simply absent.
    pub fn from_form(form_data: &serde_json::Value) -> anyhow::Result<Self> {
        serde_json::from_value(form_data.clone()).context("Invalid post build task form data")
    }

    /// Applies command line overrides. `run_if_changed` can only turn the
    /// change gate on, an unset flag keeps the persisted value.
    pub fn with_overrides(&self, script: Option<&str>, run_if_changed: bool) -> Self {
        Self {
            script: script.map_or_else(|| self.script.clone(), str::to_string),
            run_if_job_code_base_changed: run_if_changed || self.run_if_job_code_base_changed,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = Self::expand_path(&path.as_ref().to_string_lossy());
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn global_path() -> PathBuf {
        Self::expand_path("~/.config/sat-trigger/config.toml")
    }

    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.as_ref())
    }

    /// Picks the config file: an explicit path, else `sat-trigger.toml` in
    /// `dir`, else the global file if it exists. Falls back to the project
    /// file so that writes land next to the job.
    pub fn locate(explicit: Option<&Path>, dir: &Path) -> PathBuf {
        if let Some(path) = explicit {
            return Self::expand_path(&path.to_string_lossy());
        }

        let project = dir.join(CONFIG_FILE_NAME);
        if project.exists() {
            return project;
        }

        let global = Self::global_path();
        if global.exists() {
            return global;
        }

        project
    }
}

/// Loads and persists the trigger configuration for a job.
pub trait ConfigurationStore {
    fn load(&self) -> anyhow::Result<TriggerConfig>;
    fn save(&self, config: &TriggerConfig) -> anyhow::Result<()>;
}

/// Keeps the trigger in the `[trigger]` table of a TOML config file.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigurationStore for TomlConfigStore {
    fn load(&self) -> anyhow::Result<TriggerConfig> {
        Ok(Config::load_from_file(&self.path)?.trigger)
    }

    fn save(&self, trigger: &TriggerConfig) -> anyhow::Result<()> {
        let mut config = Config::load_from_file(&self.path)?;
        config.trigger = trigger.clone();
        config.save_to_file(&self.path)
    }
}

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<TriggerConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

impl ConfigurationStore for MemoryConfigStore {
    fn load(&self) -> anyhow::Result<TriggerConfig> {
        self.config
            .lock()
            .map(|config| config.clone())
            .map_err(|_| anyhow::anyhow!("configuration lock poisoned"))
    }

    fn save(&self, config: &TriggerConfig) -> anyhow::Result<()> {
        let mut current = self
            .config
            .lock()
            .map_err(|_| anyhow::anyhow!("configuration lock poisoned"))?;
        *current = config.clone();
        Ok(())
    }
}
