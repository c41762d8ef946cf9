use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://survey.db?mode=rwc";
pub const DEFAULT_SECRETS_PATH: &str = ".secrets";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
    #[error("cannot read secret file {path}: {reason}")]
    SecretFile { path: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub write_timeout: Duration,
}

impl StorageConfig {
    pub fn sqlite_file(path: &Path) -> Self {
        Self {
            database_url: format!("sqlite://{}?mode=rwc", path.display()),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 4,
            write_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageConfig {
    pub model: String,
    pub size: String,
    pub base_url: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: "gpt-image-1".to_string(),
            size: "1024x1024".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(90),
            proxy: None,
            output_dir: PathBuf::from("images"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub image: ImageConfig,
    pub secrets_path: Option<PathBuf>,
}

impl AppConfig {
    /// 读取 .env 后再从进程环境变量构建配置
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match get(key) {
                None => Ok(Duration::from_secs(default)),
                Some(v) => match v.parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
                    _ => Err(ConfigError::InvalidNumber { key, value: v }),
                },
            }
        };

        let mut storage = StorageConfig::default();
        if let Some(url) = get("DATABASE_URL") {
            storage.database_url = url;
        }
        if let Some(v) = get("SURVEY_MAX_CONNECTIONS") {
            storage.max_connections = match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: "SURVEY_MAX_CONNECTIONS",
                        value: v,
                    })
                }
            };
        }
        storage.write_timeout = secs("SURVEY_WRITE_TIMEOUT_SECS", 5)?;

        let mut image = ImageConfig::default();
        if let Some(m) = get("IMAGE_MODEL") {
            image.model = m;
        }
        if let Some(s) = get("IMAGE_SIZE") {
            image.size = s;
        }
        if let Some(u) = get("OPENAI_BASE_URL") {
            image.base_url = u;
        }
        if let Some(d) = get("IMAGE_OUTPUT_DIR") {
            image.output_dir = PathBuf::from(d);
        }
        image.proxy = get("IMAGE_PROXY");
        image.timeout = secs("IMAGE_TIMEOUT_SECS", 90)?;

        let secrets_path = Some(PathBuf::from(
            get("SURVEY_SECRETS_PATH").unwrap_or_else(|| DEFAULT_SECRETS_PATH.to_string()),
        ));

        Ok(Self {
            storage,
            image,
            secrets_path,
        })
    }
}

/// 分层密钥查找：先查托管的密钥文件，再回退到环境变量
#[derive(Clone, Debug, Default)]
pub struct SecretStore {
    managed: HashMap<String, String>,
}

impl SecretStore {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut managed = HashMap::new();
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self { managed });
        };

        let iter = dotenv::from_path_iter(path).map_err(|e| ConfigError::SecretFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        for item in iter {
            let (k, v) = item.map_err(|e| ConfigError::SecretFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            managed.insert(k, v);
        }
        Ok(Self { managed })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.managed
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.storage.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.storage.write_timeout, Duration::from_secs(5));
        assert_eq!(cfg.image.model, "gpt-image-1");
        assert_eq!(cfg.image.timeout, Duration::from_secs(90));
        assert_eq!(cfg.secrets_path, Some(PathBuf::from(DEFAULT_SECRETS_PATH)));
    }

    #[test]
    fn overrides_and_invalid_numbers() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://x.db?mode=rwc"),
            ("SURVEY_WRITE_TIMEOUT_SECS", "2"),
            ("IMAGE_SIZE", " 512x512 "),
        ]))
        .unwrap();
        assert_eq!(cfg.storage.database_url, "sqlite://x.db?mode=rwc");
        assert_eq!(cfg.storage.write_timeout, Duration::from_secs(2));
        assert_eq!(cfg.image.size, "512x512");

        let err = AppConfig::from_lookup(lookup(&[("IMAGE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "IMAGE_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn managed_secret_wins_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".secrets");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "SURVEY_TEST_MANAGED_KEY=from-file").unwrap();

        let store = SecretStore::load(Some(&path)).unwrap();
        assert_eq!(store.get("SURVEY_TEST_MANAGED_KEY").as_deref(), Some("from-file"));
        assert_eq!(store.get("SURVEY_TEST_SURELY_UNSET_KEY"), None);
    }

    #[test]
    fn missing_secret_file_is_empty_store() {
        let store = SecretStore::load(Some(Path::new("/nonexistent/.secrets"))).unwrap();
        assert!(store.managed.is_empty());
    }
}
