use crate::app_env;
use anyhow::{Context, anyhow, bail};
use std::env;

const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_IDENTITY_TOOLKIT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SECURE_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";

/// Connection details for a Firebase project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub firestore_base_url: String,
    pub identity_toolkit_base_url: String,
    pub secure_token_base_url: String,
}

/// Which set of driven adapters the client talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Firebase(FirebaseConfig),
    InMemory,
}

/// Optional OTLP endpoints. Export is only enabled when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtelEndpoints {
    pub spans: String,
    pub metrics: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: Backend,
    pub otel: Option<OtelEndpoints>,
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env` has been loaded)
    pub fn from_env() -> Result<AppConfig, anyhow::Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through [lookup], which maps a variable name from [app_env] to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig, anyhow::Error> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend_name = value(app_env::BACKEND).unwrap_or_else(|| "firebase".to_owned());
        let backend = match backend_name.to_ascii_lowercase().as_str() {
            "memory" => Backend::InMemory,
            "firebase" => {
                let api_key = value(app_env::FIREBASE_API_KEY)
                    .ok_or_else(|| anyhow!("{} must be set", app_env::FIREBASE_API_KEY))?;
                let project_id = value(app_env::FIREBASE_PROJECT_ID)
                    .ok_or_else(|| anyhow!("{} must be set", app_env::FIREBASE_PROJECT_ID))?;

                Backend::Firebase(FirebaseConfig {
                    api_key,
                    project_id,
                    firestore_base_url: base_url(
                        value(app_env::FIRESTORE_BASE_URL),
                        DEFAULT_FIRESTORE_BASE_URL,
                    ),
                    identity_toolkit_base_url: base_url(
                        value(app_env::IDENTITY_TOOLKIT_BASE_URL),
                        DEFAULT_IDENTITY_TOOLKIT_BASE_URL,
                    ),
                    secure_token_base_url: base_url(
                        value(app_env::SECURE_TOKEN_BASE_URL),
                        DEFAULT_SECURE_TOKEN_BASE_URL,
                    ),
                })
            }
            other => bail!(
                "unknown backend \"{other}\" in {}, expected \"firebase\" or \"memory\"",
                app_env::BACKEND
            ),
        };

        let otel = match (
            value(app_env::OTEL_SPAN_EXPORT_URL),
            value(app_env::OTEL_METRIC_EXPORT_URL),
        ) {
            (Some(spans), Some(metrics)) => Some(OtelEndpoints { spans, metrics }),
            _ => None,
        };

        Ok(AppConfig { backend, otel })
    }
}

fn base_url(configured: Option<String>, default: &str) -> String {
    configured
        .map(|url| url.trim_end_matches('/').to_owned())
        .unwrap_or_else(|| default.to_owned())
}

/// Loads the `.env` file if there is one. A missing file is fine, a malformed one is not.
pub fn load_dotenv() -> Result<(), anyhow::Error> {
    match dotenv::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenv::Error::Io(_)) => Ok(()),
        Err(err) => Err(err).context("reading .env file"),
    }
}
