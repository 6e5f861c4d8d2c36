use crate::{
    captcha::{CaptchaVerifier, RecaptchaVerifier, TurnstileVerifier},
    domain::SubscriberEmail,
};
use config::{Config, File, FileFormat};
use derive_getters::Getters;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::{sync::Arc, time::Duration};

/// Retrive the configuration for the application.
///
/// `configuration/base.yaml` is merged with the file for the environment
/// selected by `APP_ENVIRONMENT` (`local` by default), then with environment
/// variables such as `APP_CAPTCHA__SECRET_KEY`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let configuration_directory = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?
        .join("configuration");
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    Config::builder()
        .add_source(
            File::from(configuration_directory.join("base.yaml")).format(FileFormat::Yaml),
        )
        .add_source(
            File::from(configuration_directory.join(format!("{}.yaml", environment.as_str())))
                .format(FileFormat::Yaml),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()
}

#[derive(Debug, Clone, serde::Deserialize, Getters)]
pub struct Settings {
    pub application: ApplicationSettings,
    /// Without a database section the service keeps its data in memory.
    pub database: Option<DatabaseSettings>,
    pub email_client: EmailClientSettings,
    pub captcha: CaptchaSettings,
    pub subscription: SubscriptionSettings,
}

#[derive(Debug, Clone, serde::Deserialize, Getters)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, serde::Deserialize, Getters)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    /// Connection options for the server, without selecting a database.
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub reply_to_email: Option<String>,
    pub authorization_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn base_url(&self) -> Result<reqwest::Url, url::ParseError> {
        reqwest::Url::parse(&self.base_url)
    }

    pub fn sender(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn reply_to(&self) -> Result<Option<SubscriberEmail>, String> {
        self.reply_to_email
            .clone()
            .map(SubscriberEmail::parse)
            .transpose()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaProvider {
    Turnstile,
    Recaptcha,
}

#[derive(Debug, Clone, serde::Deserialize, Getters)]
pub struct CaptchaSettings {
    pub provider: CaptchaProvider,
    pub secret_key: Secret<String>,
    /// Overrides the provider's public verification endpoint.
    pub verify_url: Option<String>,
    #[serde(
        default = "default_min_score",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub min_score: f64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

fn default_min_score() -> f64 {
    0.5
}

impl CaptchaSettings {
    /// Build the verifier for the configured provider.
    pub fn verifier(&self) -> Result<Arc<dyn CaptchaVerifier>, reqwest::Error> {
        let timeout = Duration::from_millis(self.timeout_milliseconds);
        Ok(match self.provider {
            CaptchaProvider::Turnstile => Arc::new(TurnstileVerifier::new(
                self.verify_url.clone(),
                self.secret_key.clone(),
                timeout,
            )?),
            CaptchaProvider::Recaptcha => Arc::new(RecaptchaVerifier::new(
                self.verify_url.clone(),
                self.secret_key.clone(),
                self.min_score,
                timeout,
            )?),
        })
    }
}

#[derive(Debug, Clone, serde::Deserialize, Getters)]
pub struct SubscriptionSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cooldown_minutes: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub token_expiry_days: u32,
    /// Public site hosting the confirmation and unsubscribe pages.
    pub frontend_base_url: String,
}

/// The possible runtime environments for the application.
#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}
