use crate::error::DroveError;
use crate::transport::AuthConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

/// Top-level configuration: the declarative `[drove]` block plus the
/// ambient server/metrics bind addresses a standalone binary needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub drove: DroveConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Mirrors the keys accepted by the distilled Caddy-file block: `endpoint`,
/// `access_token`, `user_pass`, `skip_ssl_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroveConfig {
    pub endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub skip_ssl_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_dns_bind")]
    pub dns_bind: String,
    #[serde(default = "default_metrics_bind")]
    pub metrics_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_dns_bind() -> String {
    "0.0.0.0:5300".to_string()
}
fn default_metrics_bind() -> String {
    "0.0.0.0:9153".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dns_bind: default_dns_bind(),
            metrics_bind: default_metrics_bind(),
            log_level: default_log_level(),
        }
    }
}

impl DroveConfig {
    /// Endpoint required and non-empty; at most one of `access_token` or
    /// `user`/`pass` may be set, never both.
    pub fn validate(&self) -> Result<(), DroveError> {
        if self.endpoint.trim().is_empty() {
            return Err(DroveError::Config("endpoint cannot be empty".to_string()));
        }

        let has_token = self.access_token.as_ref().is_some_and(|t| !t.is_empty());
        let has_user_pass = self.user.is_some() || self.pass.is_some();

        if has_token && has_user_pass {
            return Err(DroveError::Config(
                "both access_token and user_pass should not be set".to_string(),
            ));
        }

        if has_user_pass && (self.user.is_none() || self.pass.is_none()) {
            return Err(DroveError::Config(
                "user_pass requires both a user and a password".to_string(),
            ));
        }

        Ok(())
    }

    pub fn auth(&self) -> AuthConfig {
        if let Some(token) = &self.access_token {
            if !token.is_empty() {
                return AuthConfig::bearer(token.clone());
            }
        }
        if let (Some(user), Some(pass)) = (&self.user, &self.pass) {
            return AuthConfig::basic(user.clone(), pass.clone());
        }
        AuthConfig::None
    }
}

impl Config {
    /// Load configuration from file and environment, the way the teacher's
    /// `Config::load` resolves a config path and substitutes `${VAR}`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = env::var("DROVE_DNS_CONFIG").unwrap_or_else(|_| {
            let home_config = format!(
                "{}/.config/drove-dns/config.toml",
                env::var("HOME").unwrap_or_default()
            );
            let locations = [
                "./drove-dns.toml",
                "./config.toml",
                "/etc/drove-dns/config.toml",
                home_config.as_str(),
            ];

            for path in locations {
                if Path::new(path).exists() {
                    return path.to_string();
                }
            }

            "./drove-dns.toml".to_string()
        });

        #[cfg(unix)]
        Self::validate_file_permissions(&config_path)?;

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config file: {config_path}"))?;
        let config_content = Self::substitute_env_vars(&config_content);

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("failed to parse config file: {config_path}"))?;

        config.drove.validate()?;

        Ok(config)
    }

    /// Substitute `${VAR_NAME}` with environment variable values.
    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        while let Some(start) = result.find("${") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 2..start + end];
                let value = env::var(var_name).unwrap_or_default();
                result.replace_range(start..start + end + 1, &value);
            } else {
                break;
            }
        }

        result
    }

    #[cfg(unix)]
    fn validate_file_permissions(path: &str) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let path_obj = Path::new(path);
        if !path_obj.exists() {
            tracing::debug!("config file does not exist yet: {}", path);
            return Ok(());
        }

        let metadata = fs::metadata(path_obj)
            .with_context(|| format!("failed to read metadata for config file: {path}"))?;
        let mode = metadata.permissions().mode();

        let group_readable = (mode & 0o040) != 0;
        let others_readable = (mode & 0o004) != 0;
        let group_writable = (mode & 0o020) != 0;
        let others_writable = (mode & 0o002) != 0;

        if group_readable || others_readable {
            tracing::warn!(
                "config file {} has insecure permissions: {:o}",
                path,
                mode & 0o777
            );
        }

        if group_writable || others_writable {
            anyhow::bail!(
                "config file {} is writable by group or others (mode: {:o})",
                path,
                mode & 0o777
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_substitution_replaces_single_var() {
        env::set_var("DROVE_TEST_VAR", "test_value");
        let input = "access_token = \"${DROVE_TEST_VAR}\"";
        let output = Config::substitute_env_vars(input);
        assert_eq!(output, "access_token = \"test_value\"");
        env::remove_var("DROVE_TEST_VAR");
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let config = DroveConfig {
            endpoint: "".to_string(),
            access_token: None,
            user: None,
            pass: None,
            skip_ssl_check: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_both_token_and_user_pass() {
        let config = DroveConfig {
            endpoint: "http://host".to_string(),
            access_token: Some("tok".to_string()),
            user: Some("u".to_string()),
            pass: Some("p".to_string()),
            skip_ssl_check: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_endpoint_only() {
        let config = DroveConfig {
            endpoint: "http://host".to_string(),
            access_token: None,
            user: None,
            pass: None,
            skip_ssl_check: false,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn auth_prefers_bearer_token_when_present() {
        let config = DroveConfig {
            endpoint: "http://host".to_string(),
            access_token: Some("tok".to_string()),
            user: None,
            pass: None,
            skip_ssl_check: false,
        };
        assert!(matches!(config.auth(), AuthConfig::Bearer { .. }));
    }
}
