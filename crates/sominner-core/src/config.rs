use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SominnerError};

/// Markers that identify a value copied verbatim from a sample config.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-project-ref",
    "your-anon-key",
    "your-service-role-key",
    "changeme",
    "<",
];

/// Top-level configuration for the Sominner clients.
///
/// Loaded from `~/.sominner/config.toml` by default. Every section is
/// optional in the file and falls back to its `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SominnerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub support: SupportConfig,
}

impl SominnerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SominnerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SominnerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Connection settings for the hosted backend (Data API + Auth API).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Public anonymous key. Sent as `apikey` on every request.
    pub anon_key: String,
    /// Elevated key for admin endpoints. Never required for data access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_role_key: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            service_role_key: None,
        }
    }

    pub fn with_service_role_key(mut self, key: impl Into<String>) -> Self {
        self.service_role_key = Some(key.into());
        self
    }

    /// True when both the URL and the anon key hold real values.
    pub fn is_configured(&self) -> bool {
        is_real_value(&self.base_url) && is_real_value(&self.anon_key)
    }

    /// Fail fast when the URL or anon key is missing or still a placeholder.
    pub fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(SominnerError::Config(
                "backend configuration is missing or still using placeholder values".to_string(),
            ))
        }
    }

    /// True when an elevated service key is present and not a placeholder.
    pub fn has_service_key(&self) -> bool {
        self.service_role_key.as_deref().is_some_and(is_real_value)
    }

    /// Base URL without the trailing slash.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn is_real_value(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !PLACEHOLDER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("sominner/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Support chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Domain used for generated guest emails.
    pub guest_email_domain: String,
    /// Acquisition tag stored on new customer contacts.
    pub contact_source: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            guest_email_domain: "guest.sominnercore.com".to_string(),
            contact_source: "website_chat".to_string(),
        }
    }
}
