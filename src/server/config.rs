//! Runtime configuration gathered from the environment.

use anyhow::Context;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub environment: Environment,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    /// Public base URL webhooks are delivered to; also what the provider
    /// signed, so signature checks reconstruct request URLs from it.
    pub webhook_base_url: String,
    pub jwt_secret: String,
    /// Where calls land when the dialed number matches no organization.
    /// Unset disables the degraded path and unmatched calls go to voicemail.
    pub default_organization_id: Option<Uuid>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a number")?;
        let environment = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };
        let twilio_account_sid =
            std::env::var("TWILIO_ACCOUNT_SID").context("TWILIO_ACCOUNT_SID must be set")?;
        let twilio_auth_token =
            std::env::var("TWILIO_AUTH_TOKEN").context("TWILIO_AUTH_TOKEN must be set")?;
        let webhook_base_url = std::env::var("WEBHOOK_BASE_URL")
            .context("WEBHOOK_BASE_URL must be set")?
            .trim_end_matches('/')
            .to_string();
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "your-secret-key".to_string());
        let default_organization_id = match std::env::var("DEFAULT_ORGANIZATION_ID") {
            Ok(raw) => Some(raw.parse().context("DEFAULT_ORGANIZATION_ID must be a UUID")?),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            port,
            environment,
            twilio_account_sid,
            twilio_auth_token,
            webhook_base_url,
            jwt_secret,
            default_organization_id,
        })
    }
}
