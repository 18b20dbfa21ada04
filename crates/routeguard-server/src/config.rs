use routeguard_authz::AuthzConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token verification settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Policy document locations and matching options
    #[serde(default)]
    pub authz: AuthzConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.auth.secret.is_empty() {
            return Err("auth.secret must not be empty".into());
        }
        if !self.authz.base_path.is_empty() && !self.authz.base_path.starts_with('/') {
            return Err("authz.base_path must be empty or start with '/'".into());
        }
        if self.authz.client_id.is_empty() {
            return Err("authz.client_id must not be empty".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind; 0 picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// HS256 bearer token verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared signing secret. Must be set for any real deployment.
    #[serde(default)]
    pub secret: String,
    /// Expected `iss` claim; unchecked when unset.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim; unchecked when unset.
    #[serde(default)]
    pub audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: None,
            audience: None,
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                // An explicitly named file must exist; running on bare
                // defaults would only surface as a confusing validation
                // error later.
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from("routeguard.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g. ROUTEGUARD__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("ROUTEGUARD")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.authz.client_id, "routeguard");
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().unwrap_err().contains("auth.secret"));
    }

    #[test]
    fn test_validate_rejects_bad_base_path() {
        let mut cfg = AppConfig::default();
        cfg.auth.secret = "s".into();
        cfg.authz.base_path = "api".into();
        assert!(cfg.validate().unwrap_err().contains("base_path"));
    }

    #[test]
    fn test_loader_rejects_missing_explicit_config() {
        let err = loader::load_config(Some("/no/such/routeguard.toml")).unwrap_err();
        assert!(err.contains("config file not found"), "got: {err}");
    }

    #[test]
    fn test_parse_from_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [auth]
            secret = "test-secret"

            [authz]
            public_map_path = "conf/public.json"
            base_path = "/api"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.auth.secret, "test-secret");
        assert_eq!(
            cfg.authz.public_map_path,
            std::path::PathBuf::from("conf/public.json")
        );
        assert_eq!(cfg.authz.base_path, "/api");
        assert!(cfg.validate().is_ok());
    }
}
