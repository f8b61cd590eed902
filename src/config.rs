use secrecy::Secret;
use serde::Deserialize;

pub const DEFAULT_AUTO_TRANSITION_CRON: &str = "0 5 0 * * *";
pub const DEFAULT_SYSTEM_USER_EMAIL: &str = "system@clubhouse.local";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Member status automation
    pub auto_transition_cron: String,
    pub auto_transition_on_startup: bool,
    pub system_user_email: String,

    // Initial super admin, upserted at startup when both are set
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_token: Option<Secret<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_source(&config)
    }

    pub fn from_source(config: &config::Config) -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: optional(config, "host")?.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: config.get("port")?,

            auto_transition_cron: optional(config, "auto_transition_cron")?
                .unwrap_or_else(|| DEFAULT_AUTO_TRANSITION_CRON.to_string()),
            auto_transition_on_startup: optional(config, "auto_transition_on_startup")?
                .unwrap_or(true),
            system_user_email: optional(config, "system_user_email")?
                .unwrap_or_else(|| DEFAULT_SYSTEM_USER_EMAIL.to_string()),

            bootstrap_admin_email: optional(config, "bootstrap_admin_email")?,
            bootstrap_admin_token: optional::<String>(config, "bootstrap_admin_token")?
                .map(Secret::new),
        })
    }

    /// Session cookies are only marked secure when served over https
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Missing keys fall back to a default; present but malformed values are errors
fn optional<T: serde::de::DeserializeOwned>(
    config: &config::Config,
    key: &str,
) -> Result<Option<T>, config::ConfigError> {
    match config.get(key) {
        Ok(value) => Ok(Some(value)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn source(pairs: &[(&str, &str)]) -> config::Config {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/clubhouse"),
            ("base_url", "http://localhost:3000"),
            ("port", "3000"),
        ]))
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.auto_transition_cron, DEFAULT_AUTO_TRANSITION_CRON);
        assert!(config.auto_transition_on_startup);
        assert_eq!(config.system_user_email, DEFAULT_SYSTEM_USER_EMAIL);
        assert!(config.bootstrap_admin_email.is_none());
        assert!(config.bootstrap_admin_token.is_none());
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_source(&source(&[
            ("database_url", "postgres://db/clubhouse"),
            ("base_url", "https://clubs.example.org"),
            ("port", "8080"),
            ("auto_transition_cron", "0 0 3 * * *"),
            ("auto_transition_on_startup", "false"),
            ("bootstrap_admin_email", "admin@example.org"),
            ("bootstrap_admin_token", "s3cret"),
        ]))
        .unwrap();

        assert!(config.secure_cookies());
        assert_eq!(config.auto_transition_cron, "0 0 3 * * *");
        assert!(!config.auto_transition_on_startup);
        assert_eq!(
            config.bootstrap_admin_email.as_deref(),
            Some("admin@example.org")
        );
        assert_eq!(
            config.bootstrap_admin_token.unwrap().expose_secret(),
            "s3cret"
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        let result = Config::from_source(&source(&[
            ("base_url", "http://localhost:3000"),
            ("port", "3000"),
        ]));

        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_startup_flag_fails() {
        let result = Config::from_source(&source(&[
            ("database_url", "postgres://localhost/clubhouse"),
            ("base_url", "http://localhost:3000"),
            ("port", "3000"),
            ("auto_transition_on_startup", "flase"),
        ]));

        assert!(result.is_err());
    }
}
