use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::deleter::DeleteConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_server: ServerConfig,
    pub grpc_server: ServerConfig,
    /// Public prefix of every short URL, e.g. `http://localhost:8080`
    pub base_url: String,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub trusted_subnet: TrustedSubnetConfig,
    pub deleter: DeleteConfig,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub max_connections: u32,
    /// JSON-lines persistence file for the memory backend
    pub file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret. `None` means a random per-process secret.
    pub secret: Option<String>,
    /// RPC methods that skip authentication, by bare method name
    pub public_methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustedSubnetConfig {
    /// CIDR allowed to reach internal endpoints; empty means unconfigured
    pub cidr: Option<String>,
    pub deny_if_not_configured: bool,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("STORAGE_BACKEND", "memory").to_lowercase().as_str() {
            "memory" | "file" => StorageBackend::Memory,
            "sqlite" => StorageBackend::Sqlite,
            "postgres" | "postgresql" => StorageBackend::Postgres,
            other => {
                tracing::warn!(
                    "Unknown STORAGE_BACKEND '{other}', falling back to 'memory'. Supported values: memory, sqlite, postgres"
                );
                StorageBackend::Memory
            }
        };

        let http_port = env_parse("HTTP_PORT", 8080u16)?;
        let http_server = ServerConfig {
            host: env_or("HTTP_HOST", "127.0.0.1"),
            port: http_port,
        };
        let grpc_server = ServerConfig {
            host: env_or("GRPC_HOST", "127.0.0.1"),
            port: env_parse("GRPC_PORT", 3200u16)?,
        };

        let base_url = env_or("BASE_URL", &format!("http://localhost:{http_port}"))
            .trim_end_matches('/')
            .to_string();

        let storage = StorageConfig {
            backend,
            database_url: env_or("DATABASE_URL", "sqlite://./shorty.db?mode=rwc"),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5u32)?,
            file_path: env_non_empty("FILE_STORAGE_PATH"),
        };

        let public_methods = env_non_empty("RPC_PUBLIC_METHODS")
            .map(|v| {
                v.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["Ping".to_string()]);

        let auth = AuthConfig {
            secret: env_non_empty("AUTH_SECRET"),
            public_methods,
        };

        let trusted_subnet = TrustedSubnetConfig {
            cidr: env_non_empty("TRUSTED_SUBNET"),
            deny_if_not_configured: env_flag("TRUSTED_SUBNET_DENY_IF_UNSET"),
        };

        let defaults = DeleteConfig::default();
        let deleter = DeleteConfig {
            worker_count: env_parse("DELETE_WORKERS", defaults.worker_count)?,
            batch_size: env_parse("DELETE_BATCH_SIZE", defaults.batch_size)?,
            batch_window: Duration::from_millis(env_parse(
                "DELETE_BATCH_WINDOW_MS",
                defaults.batch_window.as_millis() as u64,
            )?),
            sub_batch_size: env_parse("DELETE_SUB_BATCH_SIZE", defaults.sub_batch_size)?,
            ingress_capacity: env_parse("DELETE_INGRESS_CAPACITY", defaults.ingress_capacity)?,
            flush_capacity: env_parse("DELETE_FLUSH_CAPACITY", defaults.flush_capacity)?,
        };
        deleter.validate()?;

        Ok(Config {
            http_server,
            grpc_server,
            base_url,
            storage,
            auth,
            trusted_subnet,
            deleter,
            shutdown_timeout: Duration::from_secs(env_parse("SHUTDOWN_TIMEOUT_SECS", 10u64)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_defaults_and_errors() {
        assert_eq!(env_parse("SHORTY_TEST_UNSET_PORT", 8080u16).unwrap(), 8080);

        std::env::set_var("SHORTY_TEST_PORT", " 9090 ");
        assert_eq!(env_parse("SHORTY_TEST_PORT", 8080u16).unwrap(), 9090);

        std::env::set_var("SHORTY_TEST_BAD_PORT", "eighty");
        let err = env_parse("SHORTY_TEST_BAD_PORT", 8080u16).unwrap_err();
        assert!(err.to_string().contains("SHORTY_TEST_BAD_PORT"));
    }

    #[test]
    fn test_env_flag_and_non_empty() {
        std::env::set_var("SHORTY_TEST_FLAG", "Yes");
        assert!(env_flag("SHORTY_TEST_FLAG"));
        assert!(!env_flag("SHORTY_TEST_FLAG_UNSET"));

        std::env::set_var("SHORTY_TEST_BLANK", "   ");
        assert_eq!(env_non_empty("SHORTY_TEST_BLANK"), None);
    }

    #[test]
    fn test_server_address() {
        let server = ServerConfig {
            host: "0.0.0.0".into(),
            port: 3200,
        };
        assert_eq!(server.address(), "0.0.0.0:3200");
    }
}
