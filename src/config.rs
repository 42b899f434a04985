use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub community: CommunityConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// 社区内容服务（校验帖子是否存在）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_community_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_ms: default_community_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 参与请求中无副作用阶段（加载活动、校验时间、查找玩法）的超时
    #[serde(default = "default_prepare_timeout_ms")]
    pub prepare_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prepare_timeout_ms: default_prepare_timeout_ms(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_community_timeout_ms() -> u64 {
    3000
}

fn default_prepare_timeout_ms() -> u64 {
    2000
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_backend(raw: &str) -> anyhow::Result<StorageBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
        "memory" => Ok(StorageBackend::Memory),
        other => Err(anyhow!("unsupported DB_BACKEND: {other}")),
    }
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_defaults()?,
            Err(e) => {
                return Err(e).with_context(|| format!("无法读取配置文件 {config_path}"));
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        toml::from_str(config_str).context("解析配置文件失败")
    }

    /// 无配置文件：使用环境变量与默认值构建
    fn from_env_defaults() -> anyhow::Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_default();
        let backend = match get_env("DB_BACKEND") {
            Some(raw) => parse_backend(&raw)?,
            None if url.is_empty() => StorageBackend::Memory,
            None => StorageBackend::Postgres,
        };

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                backend,
                url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", default_max_connections()),
            },
            community: CommunityConfig {
                base_url: get_env("COMMUNITY_BASE_URL").unwrap_or_default(),
                api_key: get_env("COMMUNITY_API_KEY").unwrap_or_default(),
                timeout_ms: get_env_parse("COMMUNITY_TIMEOUT_MS", default_community_timeout_ms()),
            },
            engine: EngineConfig {
                prepare_timeout_ms: get_env_parse(
                    "ENGINE_PREPARE_TIMEOUT_MS",
                    default_prepare_timeout_ms(),
                ),
            },
        })
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DB_BACKEND") {
            self.database.backend = parse_backend(&v)?;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("COMMUNITY_BASE_URL") {
            self.community.base_url = v;
        }
        if let Ok(v) = env::var("COMMUNITY_API_KEY") {
            self.community.api_key = v;
        }
        if let Ok(v) = env::var("COMMUNITY_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.community.timeout_ms = n;
        }
        if let Ok(v) = env::var("ENGINE_PREPARE_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.engine.prepare_timeout_ms = n;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(anyhow!(
                "缺少 DATABASE_URL 环境变量，且配置文件中未设置 database.url"
            ));
        }
        if self.engine.prepare_timeout_ms == 0 {
            return Err(anyhow!("engine.prepare_timeout_ms must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
backend = "postgres"
url = "postgres://localhost/activity"
max_connections = 5

[community]
base_url = "http://community.local"
api_key = "secret"

[engine]
prepare_timeout_ms = 500
"#;
        let config = Config::parse(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.community.timeout_ms, 3000);
        assert_eq!(config.engine.prepare_timeout_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_optional_sections_use_defaults() {
        let raw = r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
backend = "memory"
"#;
        let config = Config::parse(raw).unwrap();
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.community.base_url.is_empty());
        assert_eq!(config.engine.prepare_timeout_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_url() {
        let raw = r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
backend = "postgres"
"#;
        let config = Config::parse(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_backend_names() {
        assert_eq!(parse_backend("Postgres").unwrap(), StorageBackend::Postgres);
        assert_eq!(parse_backend(" memory ").unwrap(), StorageBackend::Memory);
        assert!(parse_backend("mysql").is_err());
    }
}
