use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

use postbox_crypto::keys::{generate_session_secret, secret_to_base64};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `development` or `production`",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub environment: Environment,
    pub root: PathBuf,
    pub session_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable lookup. Empty values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment: Environment = var("POSTBOX_ENV")
            .unwrap_or_else(|| "development".into())
            .try_into()
            .map_err(anyhow::Error::msg)?;

        let host = var("POSTBOX_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("POSTBOX_PORT")
            .unwrap_or_else(|| "4321".into())
            .parse()
            .context("POSTBOX_PORT must be a port number")?;
        let db_path: PathBuf = var("POSTBOX_DB_PATH")
            .unwrap_or_else(|| "database.db".into())
            .into();
        let root = match var("POSTBOX_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().context("Failed to determine the current directory")?,
        };

        let session_secret = match var("POSTBOX_SESSION_SECRET") {
            Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret.as_str()) => secret,
            _ if environment.is_production() => {
                bail!("POSTBOX_SESSION_SECRET is unset or still a placeholder");
            }
            _ => {
                warn!("POSTBOX_SESSION_SECRET not set, using a random secret; sessions end on restart");
                secret_to_base64(&generate_session_secret())
            }
        };

        Ok(Self {
            host,
            port,
            db_path,
            environment,
            root,
            session_secret,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
