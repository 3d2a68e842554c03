use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,  // request body cap in bytes
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redis,
            redis_url: "redis://127.0.0.1/".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CryptoConfig {
    /// When false, titles are stored as plaintext. Existing envelopes are
    /// still decrypted on read.
    pub enabled: bool,
    /// Primary secret. Empty or absent falls back to the built-in default.
    #[serde(default)]
    pub secret: Option<String>,
    /// Secrets used by earlier deployments, tried in order after the primary.
    #[serde(default)]
    pub fallback_secrets: Vec<String>,
    /// Extra guesses for the forensic repair pass only.
    #[serde(default)]
    pub forensic_guesses: Vec<String>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: None,
            fallback_secrets: Vec::new(),
            forensic_guesses: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    pub secure: bool,  // send the cookie over HTTPS only
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MaintenanceConfig {
    pub repair_interval_secs: u64,  // 0 disables the sweep
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    pub min_password_len: usize,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            min_password_len: 6,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("crypto.fallback_secrets")
                    .with_list_parse_key("crypto.forensic_guesses"),
            )
            .build()?;

        config.try_deserialize()
    }
}
