use serde::Deserialize;
use std::env;

pub const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

/// Legacy flat environment variables, used only when neither the config file
/// nor an `APP__` variable provides the key.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("database.mongo_uri", "MONGO_URI"),
    ("database.mongo_database", "MONGO_DATABASE"),
    ("auth.jwt_secret", "JWT_SECRET"),
    ("cors.frontend_url", "FRONTEND_URL"),
    ("metrics.auth", "METRICS_AUTH"),
    ("telemetry.otlp_endpoint", "OTEL_EXPORTER_OTLP_ENDPOINT"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: String,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub cors: CorsSettings,
    pub metrics: MetricsSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub mongo_uri: String,
    pub mongo_database: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017/?replicaSet=rs0".to_string(),
            mongo_database: "voting".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_seconds: 15 * 60,
            refresh_token_ttl_seconds: 7 * 24 * 60 * 60,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub frontend_url: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Basic auth credentials for `/metrics` in `username:password` form
    pub auth: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            auth: "admin:changeme".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            otlp_endpoint: None,
            service_name: "voting-api".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let environment = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = config::Config::builder();
        for (key, var) in ENV_FALLBACKS {
            if let Ok(value) = env::var(var) {
                builder = builder.set_default(*key, value)?;
            }
        }

        let settings = builder
            .add_source(config::File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SECTION__KEY overrides everything else
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.environment = environment;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.is_production() && self.uses_dev_jwt_secret() {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret must be set in production".to_string(),
            ));
        }
        if self.auth.access_token_ttl_seconds <= 0 || self.auth.refresh_token_ttl_seconds <= 0 {
            return Err(config::ConfigError::Message(
                "token TTLs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "prod"
    }

    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.auth.jwt_secret.is_empty() || self.auth.jwt_secret == DEV_JWT_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable_for_development() {
        let config = Config {
            environment: "dev".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_ok());
        assert!(config.uses_dev_jwt_secret());
        assert_eq!(config.auth.access_token_ttl_seconds, 900);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let mut config = Config {
            environment: "prod".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }
}
