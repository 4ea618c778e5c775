//! Application configuration
//!
//! Loaded from a JSON file. Lookup order:
//! - explicit `--config <path>`
//! - `$NFT_CONFIG`
//! - `<config_dir>/net-forensic-tool/config.json` if it exists
//! - built-in defaults
//!
//! Missing keys fall back to their defaults, so a config file only needs the
//! values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisOptions, Thresholds, DEFAULT_TOP_TALKERS};
use crate::common::{HashAlgorithm, DEFAULT_CHUNK_SIZE};
use crate::error::{ForensicError, ForensicResult};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "NFT_CONFIG";

const APP_DIR: &str = "net-forensic-tool";
const CONFIG_FILE: &str = "config.json";

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Per-user config file location, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// SQLite evidence store
    pub database_path: PathBuf,
    /// Where captured and imported evidence files live
    pub evidence_dir: PathBuf,
    pub report_dir: PathBuf,
    /// Live capture tool (tcpdump-compatible arguments)
    pub capture_tool: PathBuf,
    /// Tool used to read captures back for counting and display
    pub reader_tool: PathBuf,
    /// Wall-clock limit for one live capture
    pub capture_timeout_secs: u64,
    /// `md5`, `sha1`, `sha256`, `sha512` or `blake3`
    pub fingerprint_algorithm: String,
    pub hash_chunk_size: usize,
    pub top_talkers_limit: usize,
    pub extraction_threads: usize,
    pub thresholds: Thresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        let root = data_root();
        Self {
            version: CONFIG_VERSION,
            database_path: root.join("nft.db"),
            evidence_dir: root.join("outputs"),
            report_dir: root.join("reports"),
            capture_tool: PathBuf::from("tcpdump"),
            reader_tool: PathBuf::from("tcpdump"),
            capture_timeout_secs: 10,
            fingerprint_algorithm: "sha256".to_string(),
            hash_chunk_size: DEFAULT_CHUNK_SIZE,
            top_talkers_limit: DEFAULT_TOP_TALKERS,
            extraction_threads: num_cpus::get(),
            thresholds: Thresholds::default(),
        }
    }
}

impl AppConfig {
    /// Resolve the config file to use, if any
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        default_config_path().filter(|p| p.is_file())
    }

    /// Load and validate configuration following the lookup order
    pub fn load(explicit: Option<&Path>) -> ForensicResult<Self> {
        let config = match Self::locate(explicit) {
            Some(path) => Self::load_from(&path)?,
            None => {
                debug!("No config file found; using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> ForensicResult<Self> {
        info!("Loading config from: {}", path.display());

        let json = fs::read_to_string(path)
            .map_err(|e| ForensicError::Config(format!("{}: {}", path.display(), e)))?;
        let config: AppConfig = serde_json::from_str(&json)
            .map_err(|e| ForensicError::Config(format!("{}: {}", path.display(), e)))?;

        if config.version > CONFIG_VERSION {
            warn!(
                "Config file version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            );
        }
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> ForensicResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ForensicError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, &json).map_err(|e| ForensicError::io(path, e))?;
        info!("Config saved: {} bytes", json.len());
        Ok(())
    }

    pub fn validate(&self) -> ForensicResult<()> {
        self.hash_algorithm()?;
        if self.hash_chunk_size == 0 {
            return Err(ForensicError::Config("hash_chunk_size must be greater than zero".into()));
        }
        if self.top_talkers_limit == 0 {
            return Err(ForensicError::Config("top_talkers_limit must be greater than zero".into()));
        }
        if self.capture_timeout_secs == 0 {
            return Err(ForensicError::Config("capture_timeout_secs must be greater than zero".into()));
        }
        self.thresholds.validate().map_err(ForensicError::Config)?;
        Ok(())
    }

    pub fn hash_algorithm(&self) -> ForensicResult<HashAlgorithm> {
        self.fingerprint_algorithm.parse().map_err(ForensicError::Config)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn analysis_options(&self) -> ForensicResult<AnalysisOptions> {
        Ok(AnalysisOptions {
            algorithm: self.hash_algorithm()?,
            chunk_size: self.hash_chunk_size,
            thresholds: self.thresholds,
            threads: self.extraction_threads.max(1),
            top_limit: self.top_talkers_limit,
        })
    }

    /// Create the evidence and report directories
    pub fn ensure_directories(&self) -> ForensicResult<()> {
        for dir in [&self.evidence_dir, &self.report_dir] {
            fs::create_dir_all(dir).map_err(|e| ForensicError::io(dir.as_path(), e))?;
        }
        Ok(())
    }
}
