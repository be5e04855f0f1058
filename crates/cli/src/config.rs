//! The recognized configuration surface. Loaded from a TOML file
//! and overridden by `GH_INTEL_<FIELD>` environment variables, with an
//! explicit env var always winning over whatever the file or built-in
//! default provided.

use std::path::PathBuf;
use std::str::FromStr;

use gh_intel_types::ConfigError;

/// Every recognized startup option, minus
/// `github_token` (read separately — never via a plain config field, so it
/// never round-trips through a file an operator might commit by accident).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub seed_orgs: Vec<String>,
    pub seed_repos: Vec<String>,
    pub watchlist_usernames: Vec<String>,
    pub freshness_window_days: i64,
    pub worker_concurrency: usize,
    pub per_user_repo_cap: usize,
    pub http_timeout_seconds: u64,
    pub per_candidate_budget_seconds: u64,
    /// `None` means "derive from whether a token is configured" — 720 ms
    /// with a token, 60000 ms without.
    pub min_intercall_spacing_ms: Option<u64>,
    pub dictionaries_version: String,
    pub database_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            seed_orgs: Vec::new(),
            seed_repos: Vec::new(),
            watchlist_usernames: Vec::new(),
            freshness_window_days: 30,
            worker_concurrency: 8,
            per_user_repo_cap: 50,
            http_timeout_seconds: 30,
            per_candidate_budget_seconds: 600,
            min_intercall_spacing_ms: None,
            dictionaries_version: gh_intel_core::extractors::dictionary::DICTIONARIES_VERSION.to_string(),
            database_path: None,
            log_dir: None,
        }
    }
}

impl FileConfig {
    pub fn load(path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
                toml::from_str::<Self>(&raw).map_err(|e| ConfigError::InvalidValue { field: "<config file>".to_string(), reason: e.to_string() })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// `GH_INTEL_<FIELD>` wins over whatever the file (or the built-in
    /// default) provided.
    fn apply_env_overrides(&mut self) {
        override_from_env("GH_INTEL_FRESHNESS_WINDOW_DAYS", &mut self.freshness_window_days);
        override_from_env("GH_INTEL_WORKER_CONCURRENCY", &mut self.worker_concurrency);
        override_from_env("GH_INTEL_PER_USER_REPO_CAP", &mut self.per_user_repo_cap);
        override_from_env("GH_INTEL_HTTP_TIMEOUT_SECONDS", &mut self.http_timeout_seconds);
        override_from_env("GH_INTEL_PER_CANDIDATE_BUDGET_SECONDS", &mut self.per_candidate_budget_seconds);
        if let Ok(raw) = std::env::var("GH_INTEL_MIN_INTERCALL_SPACING_MS") {
            if let Ok(parsed) = raw.parse() {
                self.min_intercall_spacing_ms = Some(parsed);
            }
        }
        if let Ok(raw) = std::env::var("GH_INTEL_DICTIONARIES_VERSION") {
            self.dictionaries_version = raw;
        }
    }

    pub fn min_intercall_spacing_ms(&self, has_token: bool) -> u64 {
        self.min_intercall_spacing_ms.unwrap_or(if has_token { 720 } else { 60_000 })
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(default_database_path)
    }
}

fn override_from_env<T: FromStr>(key: &str, field: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(std::env::temp_dir).join("gh-intel").join("intel.db")
}

/// Reads the GitHub credential from `GH_INTEL_GITHUB_TOKEN`, falling back to
/// `token_file`. Never accepted as a bare CLI flag, so it can't show up in
/// `ps`.
pub fn load_github_token(token_file: Option<&PathBuf>) -> Result<Option<gh_intel_types::GithubToken>, ConfigError> {
    if let Ok(value) = std::env::var("GH_INTEL_GITHUB_TOKEN") {
        if !value.is_empty() {
            return Ok(Some(gh_intel_types::GithubToken::new(value)));
        }
    }
    if let Some(path) = token_file {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(Some(gh_intel_types::GithubToken::new(trimmed.to_string())));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = FileConfig::default();
        assert_eq!(config.freshness_window_days, 30);
        assert_eq!(config.worker_concurrency, 8);
        assert_eq!(config.per_user_repo_cap, 50);
        assert_eq!(config.min_intercall_spacing_ms(true), 720);
        assert_eq!(config.min_intercall_spacing_ms(false), 60_000);
    }

    #[test]
    fn unknown_field_in_file_is_rejected() {
        let toml = "worker_concurrency = 4\nnonexistent_field = true\n";
        let err = toml::from_str::<FileConfig>(toml).unwrap_err();
        assert!(err.to_string().contains("nonexistent_field") || err.to_string().contains("unknown field"));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "worker_concurrency = 2\nseed_orgs = [\"acme\"]\n").unwrap();
        let config = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(config.worker_concurrency, 2);
        assert_eq!(config.seed_orgs, vec!["acme".to_string()]);
    }
}
