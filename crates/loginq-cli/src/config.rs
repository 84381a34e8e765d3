// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use loginq_app::{DEFAULT_AUTOSAVE_DELAY, INITIAL_WINDOW, WINDOW_STEP};
use loginq_cache::{CacheRegion, FreshnessPolicy};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "LOGINQ_CONFIG_PATH";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_API_TIMEOUT: &str = "20s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            cache: Cache::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub user_id: Option<String>,
    pub department: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_API_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_API_TIMEOUT.to_owned()),
            user_id: None,
            department: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cache {
    pub db_path: Option<String>,
    pub lead_list_show: Option<String>,
    pub lead_list_skip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<usize>,
    pub page_step: Option<usize>,
    pub autosave_delay: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(INITIAL_WINDOW),
            page_step: Some(WINDOW_STEP),
            autosave_delay: Some("2000ms".to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(loginq_cache::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [api], [cache], and [ui]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url {
            let trimmed = base_url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!(
                    "api.base_url in {} must start with http:// or https://, got {:?}",
                    path.display(),
                    base_url
                );
            }
        }

        if let Some(timeout) = &self.api.timeout
            && parse_duration(timeout)?.is_zero()
        {
            bail!(
                "api.timeout in {} must be positive, got {}",
                path.display(),
                timeout
            );
        }

        if let Some(db_path) = &self.cache.db_path {
            loginq_cache::validate_db_path(db_path)?;
        }

        self.lead_list_policy()
            .with_context(|| format!("cache thresholds in {}", path.display()))?;

        if self.ui.page_size == Some(0) {
            bail!("ui.page_size in {} must be positive", path.display());
        }
        if self.ui.page_step == Some(0) {
            bail!("ui.page_step in {} must be positive", path.display());
        }

        if let Some(delay) = &self.ui.autosave_delay {
            parse_duration(delay)
                .with_context(|| format!("ui.autosave_delay in {}", path.display()))?;
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn user_id(&self) -> Option<&str> {
        non_blank(self.api.user_id.as_deref())
    }

    pub fn department(&self) -> Option<&str> {
        non_blank(self.api.department.as_deref())
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => loginq_cache::default_cache_path(),
        }
    }

    /// Lead-list thresholds, falling back per field to the built-in policy.
    pub fn lead_list_policy(&self) -> Result<FreshnessPolicy> {
        let defaults = CacheRegion::LeadList.default_policy();
        let show = match &self.cache.lead_list_show {
            Some(raw) => parse_duration(raw)?,
            None => defaults.show(),
        };
        let skip = match &self.cache.lead_list_skip {
            Some(raw) => parse_duration(raw)?,
            None => defaults.skip(),
        };
        FreshnessPolicy::new(show, skip)
    }

    pub fn page_size(&self) -> usize {
        self.ui.page_size.unwrap_or(INITIAL_WINDOW)
    }

    pub fn page_step(&self) -> usize {
        self.ui.page_step.unwrap_or(WINDOW_STEP)
    }

    pub fn autosave_delay(&self) -> Result<Duration> {
        match &self.ui.autosave_delay {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_AUTOSAVE_DELAY),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# loginq config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# user_id = \"u-123\"\n# department = \"Login Desk\"\n\n[cache]\n# Optional. Default is the platform cache dir (for example ~/.cache/loginq/cache.db)\n# db_path = \"/absolute/path/to/cache.db\"\nlead_list_show = \"300s\"\nlead_list_skip = \"30s\"\n\n[ui]\npage_size = {}\npage_step = {}\n# 0ms saves every edit immediately\nautosave_delay = \"2000ms\"\n",
            path.display(),
            DEFAULT_API_BASE_URL,
            DEFAULT_API_TIMEOUT,
            INITIAL_WINDOW,
            WINDOW_STEP,
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 20s)")
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_PATH_ENV, Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.api_base_url(), "http://localhost:8000/api");
        assert_eq!(config.api_timeout()?, Duration::from_secs(20));
        assert_eq!(config.page_size(), 50);
        assert_eq!(config.page_step(), 100);
        assert_eq!(config.autosave_delay()?, Duration::from_millis(2000));
        let policy = config.lead_list_policy()?;
        assert_eq!(policy.show(), Duration::from_secs(300));
        assert_eq!(policy.skip(), Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[api]\ndepartment = \"Login Desk\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[api], [cache], and [ui]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[api]\nbase_url = \"https://crm.example.com/api/\"\ntimeout = \"5s\"\nuser_id = \"u-9\"\ndepartment = \" Login Desk \"\n[cache]\nlead_list_show = \"10m\"\nlead_list_skip = \"1m\"\n[ui]\npage_size = 25\npage_step = 40\nautosave_delay = \"0ms\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.api_base_url(), "https://crm.example.com/api");
        assert_eq!(config.api_timeout()?, Duration::from_secs(5));
        assert_eq!(config.user_id(), Some("u-9"));
        assert_eq!(config.department(), Some("Login Desk"));
        assert_eq!(config.lead_list_policy()?.show(), Duration::from_secs(600));
        assert_eq!(config.page_size(), 25);
        assert_eq!(config.page_step(), 40);
        assert!(config.autosave_delay()?.is_zero());
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        assert!(error.to_string().contains("unsupported config version 3"));
        Ok(())
    }

    #[test]
    fn skip_at_or_above_show_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[cache]\nlead_list_show = \"30s\"\nlead_list_skip = \"30s\"\n")?;
        let error = Config::load(&path).expect_err("skip == show should fail");
        assert!(format!("{error:#}").contains("cache thresholds"));
        Ok(())
    }

    #[test]
    fn non_http_base_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[api]\nbase_url = \"ftp://crm\"\n")?;
        let error = Config::load(&path).expect_err("ftp base url should fail");
        assert!(error.to_string().contains("api.base_url"));
        Ok(())
    }

    #[test]
    fn zero_timeout_and_page_size_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[api]\ntimeout = \"0s\"\n")?;
        assert!(Config::load(&path).is_err());

        let (_temp, path) = write_config("version = 1\n[ui]\npage_size = 0\n")?;
        let error = Config::load(&path).expect_err("zero page size should fail");
        assert!(error.to_string().contains("ui.page_size"));
        Ok(())
    }

    #[test]
    fn uri_cache_path_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[cache]\ndb_path = \"file:/tmp/cache.db?mode=ro\"\n")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn cache_path_prefers_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[cache]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(loginq_cache::CACHE_PATH_ENV, "/from/env.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.cache_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(loginq_cache::CACHE_PATH_ENV);
        }
        assert_eq!(resolved, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn cache_path_uses_env_override_when_unset() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(loginq_cache::CACHE_PATH_ENV, "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.cache_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(loginq_cache::CACHE_PATH_ENV);
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn durations_parse_with_units() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("20s")?, Duration::from_secs(20));
        assert_eq!(parse_duration("5m")?, Duration::from_secs(300));
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("fast").is_err());
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 50);
        assert!(config.department().is_none());
        Ok(())
    }
}
