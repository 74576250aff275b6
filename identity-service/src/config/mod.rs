use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::redaction::VISIBLE_PREFIX_CHARS;
use std::env;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// `None` runs the service on the in-memory store (dev only).
    pub database: Option<DatabaseConfig>,
    pub gitlab: GitlabConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct GitlabConfig {
    /// `None` switches to the built-in mock provider (dev only).
    pub root_url: Option<String>,
    pub admin_token: Secret<String>,
    /// Secret handed out for the default fixture account and by the mock provider.
    pub mock_user_token: Secret<String>,
    pub token_name: String,
    pub timeout_seconds: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match get_optional_env("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url: Secret::new(url),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            }),
            None => None,
        };

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database,
            gitlab: GitlabConfig {
                root_url: get_optional_env("GITLAB_ROOT_URL"),
                admin_token: Secret::new(get_env("GITLAB_ADMIN_TOKEN", Some(""), is_prod)?),
                mock_user_token: Secret::new(get_env(
                    "GITLAB_MOCK_USER_TOKEN",
                    Some("mock-private-user-token"),
                    is_prod,
                )?),
                token_name: get_env("GITLAB_TOKEN_NAME", Some("identity-service-token"), is_prod)?,
                timeout_seconds: parse_env("GITLAB_TIMEOUT_SECONDS", "10", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.gitlab.timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GITLAB_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.gitlab.mock_user_token.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GITLAB_MOCK_USER_TOKEN must not be empty"
            )));
        }

        if let Some(db) = &self.database {
            if db.min_connections > db.max_connections {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS"
                )));
            }
        }

        if self.gitlab.root_url.is_some() && self.gitlab.admin_token.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GITLAB_ADMIN_TOKEN is required when GITLAB_ROOT_URL is set"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if self.database.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production"
                )));
            }

            if self.gitlab.root_url.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GITLAB_ROOT_URL is required in production"
                )));
            }

            if self.gitlab.mock_user_token.expose_secret().chars().count() <= VISIBLE_PREFIX_CHARS {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GITLAB_MOCK_USER_TOKEN is too short"
                )));
            }
        }

        Ok(())
    }

    pub fn is_degraded(&self) -> bool {
        self.database.is_none() || self.gitlab.root_url.is_none()
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> IdentityConfig {
        IdentityConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: None,
            gitlab: GitlabConfig {
                root_url: None,
                admin_token: Secret::new(String::new()),
                mock_user_token: Secret::new("mock-private-user-token".to_string()),
                token_name: "identity-service-token".to_string(),
                timeout_seconds: 10,
            },
        }
    }

    #[test]
    fn dev_defaults_are_valid_and_degraded() {
        let config = dev_config();
        assert!(config.validate().is_ok());
        assert!(config.is_degraded());
    }

    #[test]
    fn prod_requires_database_and_provider() {
        let mut config = dev_config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.database = Some(DatabaseConfig {
            url: Secret::new("postgres://localhost/identity".to_string()),
            max_connections: 5,
            min_connections: 1,
        });
        assert!(config.validate().is_err());

        config.gitlab.root_url = Some("https://gitlab.example.com".to_string());
        config.gitlab.admin_token = Secret::new("admin-token".to_string());
        assert!(config.validate().is_ok());
        assert!(!config.is_degraded());
    }

    #[test]
    fn provider_url_needs_admin_token() {
        let mut config = dev_config();
        config.gitlab.root_url = Some("https://gitlab.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = dev_config();
        config.gitlab.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
