use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub debug: bool,
    pub db_path: Option<String>,
    pub listen_port: Option<u16>,
    pub dev_cors_origin: Option<String>,
    pub auth: AuthConfig,
}

fn default_app_name() -> String {
    "skillLoop API".to_string()
}

/// How bearer tokens are verified.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Identity provider with published signing keys.
    Jwks(JwksConfig),
    /// HS256 with a local secret, for development and tests.
    SharedSecret(SharedSecretConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksConfig {
    /// Identity provider host, e.g. `tenant.eu.auth0.com`.
    pub domain: String,
    pub api_audience: String,
    pub issuer: String,
    /// Accepted as an alternate audience (ID tokens).
    pub client_id: Option<String>,
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
    #[serde(default = "default_jwks_ttl")]
    pub jwks_cache_ttl_secs: u64,
    /// Minimum age of the cached key set before an unknown `kid` refetches it.
    #[serde(default = "default_jwks_refresh")]
    pub jwks_min_refresh_secs: u64,
    /// Overrides the key set location derived from `domain`.
    #[serde(default)]
    pub jwks_url: Option<String>,
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_jwks_ttl() -> u64 {
    600
}

fn default_jwks_refresh() -> u64 {
    30
}

impl JwksConfig {
    pub fn jwks_url(&self) -> String {
        if let Some(url) = &self.jwks_url {
            return url.clone();
        }
        let domain = self
            .domain
            .trim_start_matches("https://")
            .trim_end_matches('/');
        format!("https://{}/.well-known/jwks.json", domain)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharedSecretConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::Invalid(m) => write!(f, "invalid config: {}", m),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.auth {
            AuthConfig::Jwks(j) => {
                if j.domain.trim().is_empty() {
                    return Err(ConfigError::Invalid("auth.domain is empty".into()));
                }
                if j.algorithms.is_empty() {
                    return Err(ConfigError::Invalid("auth.algorithms is empty".into()));
                }
                if j.jwks_cache_ttl_secs == 0 {
                    return Err(ConfigError::Invalid(
                        "auth.jwks_cache_ttl_secs must be positive".into(),
                    ));
                }
            }
            AuthConfig::SharedSecret(s) => {
                if s.secret.len() < 8 {
                    return Err(ConfigError::Invalid(
                        "auth.secret must be at least 8 bytes".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Database path: `DB_PATH` env, then config, then `data/app.db`.
    pub fn resolved_db_path(&self) -> String {
        env::var("DB_PATH")
            .ok()
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(|| "data/app.db".into())
    }

    /// Listen port: `PORT` env, then config, then 8000.
    pub fn resolved_port(&self) -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .or(self.listen_port)
            .unwrap_or(8000)
    }
}
