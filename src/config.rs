use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Application configuration: a TOML file with `SV_CONF_*` env overrides on
/// top. Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/skyvault.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Empty or placeholder secrets are replaced with a generated one,
    /// persisted under `data/.jwt_secret`
    pub secret: String,
    pub access_token_expire_minutes: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: PLACEHOLDER_SECRET.to_string(),
            access_token_expire_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub local_path: String,
    /// Base URL prepended to signed download links
    pub public_url: String,
    pub download_ttl_secs: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: "data/uploads".to_string(),
            public_url: "http://localhost:5000".to_string(),
            download_ttl_secs: 60,
        }
    }
}

const PLACEHOLDER_SECRET: &str = "change-me";
const CONFIG_PATHS: [&str; 2] = ["config.toml", "data/config.toml"];
const SECRET_PATH: &str = "data/.jwt_secret";

fn env_override<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(parsed) = env::var(key).ok().and_then(|v| v.parse().ok()) {
        *slot = parsed;
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    fn from_file() -> anyhow::Result<Self> {
        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                let config = toml::from_str(&fs::read_to_string(path)?)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Env overrides, `SV_CONF_<SECTION>_<KEY>`. Unparseable values are
    /// ignored in favor of what the file or defaults gave.
    fn apply_env_overrides(&mut self) {
        env_override("SV_CONF_SERVER_HOST", &mut self.server.host);
        env_override("SV_CONF_SERVER_PORT", &mut self.server.port);
        env_override("SV_CONF_DATABASE_PATH", &mut self.database.path);
        env_override("SV_CONF_JWT_SECRET", &mut self.jwt.secret);
        env_override(
            "SV_CONF_JWT_ACCESS_EXPIRE",
            &mut self.jwt.access_token_expire_minutes,
        );
        env_override("SV_CONF_STORAGE_LOCAL_PATH", &mut self.storage.local_path);
        env_override("SV_CONF_STORAGE_PUBLIC_URL", &mut self.storage.public_url);
        env_override(
            "SV_CONF_STORAGE_DOWNLOAD_TTL",
            &mut self.storage.download_ttl_secs,
        );
    }

    /// Never run with the placeholder secret: generate one on first start
    /// and persist it so tokens survive restarts.
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret != PLACEHOLDER_SECRET && !self.jwt.secret.is_empty() {
            return Ok(());
        }

        let secret_path = Path::new(SECRET_PATH);
        if secret_path.exists() {
            self.jwt.secret = fs::read_to_string(secret_path)?.trim().to_string();
            tracing::info!("Loaded persisted JWT secret from {}", SECRET_PATH);
        } else {
            let secret = uuid::Uuid::new_v4().to_string();
            if let Some(parent) = secret_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(secret_path, &secret)?;
            self.jwt.secret = secret;
            tracing::info!("Generated and persisted new JWT secret to {}", SECRET_PATH);
        }
        Ok(())
    }

    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.storage.local_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.download_ttl_secs, 60);
        assert_eq!(config.jwt.access_token_expire_minutes, 60);
        assert_eq!(config.jwt.secret, PLACEHOLDER_SECRET);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [storage]
            download_ttl_secs = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.download_ttl_secs, 300);
        assert_eq!(config.database.path, "data/skyvault.db");
    }
}
