use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Email delivery
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub sendgrid_api_key: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
db_dir = "/tmp/encore"
spotify_client_id = "id"
spotify_client_secret = "secret"

[email]
sendgrid_api_key = "sg-key"
from_email = "noreply@example.com"
from_name = "Encore"
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_dir.as_deref(), Some("/tmp/encore"));
        let email = config.email.unwrap();
        assert_eq!(email.sendgrid_api_key.as_deref(), Some("sg-key"));
        assert_eq!(email.from_name.as_deref(), Some("Encore"));
    }

    #[test]
    fn test_missing_sections_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "db_dir = \"/tmp/encore\"").unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.email.is_none());
        assert!(config.spotify_client_id.is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "db_dir = [not toml").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }
}
