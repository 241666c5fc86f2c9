//! Application configuration for ttabkit.
//!
//! User config lives at `~/.ttabkit/ttabkit.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file; each section names the
//! environment variable that carries its secret.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtabError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ttabkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ttabkit";

// ---------------------------------------------------------------------------
// Config structs (matching ttabkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Bulk data portal settings.
    #[serde(default)]
    pub uspto: UsptoConfig,

    /// Appellate search API settings.
    #[serde(default)]
    pub courtlistener: CourtListenerConfig,

    /// Appeal candidate ranking.
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Fallback opinion heuristics.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding downloaded archives and unpacked document sets.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Tabular export destination.
    #[serde(default = "default_output_csv")]
    pub output_csv: String,

    /// libSQL database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_csv: default_output_csv(),
            db_path: default_db_path(),
        }
    }
}

fn default_data_dir() -> String {
    "data/ttab".into()
}
fn default_output_csv() -> String {
    "output/ttab_opinions.csv".into()
}
fn default_db_path() -> String {
    "output/ttabkit.db".into()
}

/// `[uspto]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsptoConfig {
    /// Dataset products endpoint; the product id is appended.
    #[serde(default = "default_uspto_base_url")]
    pub api_base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_uspto_key_env")]
    pub api_key_env: String,

    /// Minimum seconds between the starts of two downloads.
    #[serde(default = "default_download_interval")]
    pub download_interval_secs: u64,

    /// Per-request timeout.
    #[serde(default = "default_uspto_timeout")]
    pub timeout_secs: u64,

    /// Attempts per descriptor (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts; doubles after each failure.
    #[serde(default = "default_uspto_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for UsptoConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_uspto_base_url(),
            api_key_env: default_uspto_key_env(),
            download_interval_secs: default_download_interval(),
            timeout_secs: default_uspto_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_uspto_backoff(),
        }
    }
}

fn default_uspto_base_url() -> String {
    "https://api.uspto.gov/api/v1/datasets/products".into()
}
fn default_uspto_key_env() -> String {
    "USPTO_API_KEY".into()
}
fn default_download_interval() -> u64 {
    15
}
fn default_uspto_timeout() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    3
}
fn default_uspto_backoff() -> u64 {
    60_000
}

/// `[courtlistener]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtListenerConfig {
    /// Whether the appeal matcher runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// REST API root, ending in a slash.
    #[serde(default = "default_cl_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API token.
    #[serde(default = "default_cl_token_env")]
    pub api_token_env: String,

    /// Court identifier filter.
    #[serde(default = "default_court_id")]
    pub court_id: String,

    /// Minimum milliseconds between two searches, across all callers.
    #[serde(default = "default_cl_interval")]
    pub min_interval_ms: u64,

    /// Attempts per case record for transient failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts.
    #[serde(default = "default_cl_backoff")]
    pub retry_backoff_ms: u64,

    /// Results requested per search.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout.
    #[serde(default = "default_cl_timeout")]
    pub timeout_secs: u64,
}

impl Default for CourtListenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_cl_base_url(),
            api_token_env: default_cl_token_env(),
            court_id: default_court_id(),
            min_interval_ms: default_cl_interval(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_cl_backoff(),
            page_size: default_page_size(),
            timeout_secs: default_cl_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cl_base_url() -> String {
    "https://www.courtlistener.com/api/rest/v4/".into()
}
fn default_cl_token_env() -> String {
    "COURTLISTENER_API_TOKEN".into()
}
fn default_court_id() -> String {
    "cafc".into()
}
fn default_cl_interval() -> u64 {
    1_000
}
fn default_cl_backoff() -> u64 {
    2_000
}
fn default_page_size() -> u32 {
    20
}
fn default_cl_timeout() -> u64 {
    30
}

/// `[matching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum combined score a name-search candidate must reach.
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,

    /// Phrase added to every party-name search.
    #[serde(default = "default_domain_term")]
    pub domain_term: String,

    /// Weight of the party-name overlap component.
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,

    /// Weight of the filing-date proximity component.
    #[serde(default = "default_date_weight")]
    pub date_weight: f64,

    /// Candidates considered from a name search.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_threshold(),
            domain_term: default_domain_term(),
            name_weight: default_name_weight(),
            date_weight: default_date_weight(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_threshold() -> f64 {
    0.7
}
fn default_domain_term() -> String {
    "Trademark Trial and Appeal Board".into()
}
fn default_name_weight() -> f64 {
    0.75
}
fn default_date_weight() -> f64 {
    0.25
}
fn default_max_candidates() -> usize {
    15
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Whole-word keywords looked for in descriptive text.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Case-insensitive phrases looked for in free text.
    #[serde(default = "default_decision_phrases")]
    pub decision_phrases: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            decision_phrases: default_decision_phrases(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    ["opinion", "decision", "ruling", "judgment"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_decision_phrases() -> Vec<String> {
    [
        "it is ordered",
        "it is decided",
        "we conclude",
        "we hold",
        "judgment for",
        "proceeding is dismissed",
        "opposition is sustained",
        "opposition is denied",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ttabkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| TtabError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ttabkit/ttabkit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TtabError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TtabError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TtabError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| TtabError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TtabError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a credential from the named env var. Missing or empty is an auth error,
/// raised before any network call is attempted.
pub fn read_credential(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(TtabError::auth(format!(
            "{service} credential not found. Set the {var_name} environment variable."
        ))),
    }
}
