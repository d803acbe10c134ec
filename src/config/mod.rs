mod file_config;

pub use file_config::{EmailConfig, FileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that take part in config resolution.
/// TOML file values override these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,

    /// Missing when no delivery credentials were configured; the server
    /// then runs with outbound email disabled.
    pub email: Option<EmailSettings>,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub sendgrid_api_key: String,
    pub from_email: String,
    pub from_name: String,
}

const DEFAULT_FROM_NAME: &str = "Encore";

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let spotify_client_id = file
            .spotify_client_id
            .or_else(|| cli.spotify_client_id.clone())
            .ok_or_else(|| anyhow::anyhow!("spotify_client_id must be configured"))?;
        let spotify_client_secret = file
            .spotify_client_secret
            .or_else(|| cli.spotify_client_secret.clone())
            .ok_or_else(|| anyhow::anyhow!("spotify_client_secret must be configured"))?;

        let email_file = file.email.unwrap_or_default();
        let api_key = email_file
            .sendgrid_api_key
            .or_else(|| cli.sendgrid_api_key.clone());
        let from_email = email_file.from_email.or_else(|| cli.from_email.clone());
        let from_name = email_file
            .from_name
            .or_else(|| cli.from_name.clone())
            .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string());

        let email = match (api_key, from_email) {
            (Some(sendgrid_api_key), Some(from_email)) => Some(EmailSettings {
                sendgrid_api_key,
                from_email,
                from_name,
            }),
            (None, None) => None,
            _ => bail!("sendgrid_api_key and from_email must be configured together"),
        };

        Ok(Self {
            db_dir,
            spotify_client_id,
            spotify_client_secret,
            email,
        })
    }

    pub fn tracker_db_path(&self) -> PathBuf {
        self.db_dir.join("tracker.db")
    }
}
