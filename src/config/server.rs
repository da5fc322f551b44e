use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://audio.example.com").
    /// Used for locally stored media URLs. Defaults to http://<host>:<port>.
    pub public_base_url: Option<String>,
    /// Deadline applied to every request.
    pub request_timeout_secs: u64,
    /// Client page that accepts `token` and `userId` query parameters.
    pub password_reset_link: String,
    pub media: MediaConfig,
    pub mail: MailConfig,
}

/// Where uploaded audio and images go.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MediaConfig {
    /// Files under `<data_dir>/media`, served at `/media/{file}`.
    #[default]
    Local,
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MailConfig {
    /// Emails are written to the log only.
    #[default]
    Log,
    Mailtrap {
        token: String,
        sender: String,
        #[serde(default)]
        endpoint: Option<String>,
    },
}

impl ServerConfig {
    /// Reads a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("soundshelf.db")
    }

    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            public_base_url: None,
            request_timeout_secs: 30,
            password_reset_link: "http://localhost:3000/reset-password".to_string(),
            media: MediaConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000

            [media]
            backend = "cloudinary"
            cloud_name = "demo"
            api_key = "key"
            api_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.request_timeout_secs, 30);
        assert!(matches!(config.media, MediaConfig::Cloudinary { ref cloud_name, .. } if cloud_name == "demo"));
        assert!(matches!(config.mail, MailConfig::Log));
    }

    #[test]
    fn test_base_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");

        config.public_base_url = Some("https://audio.example.com/".to_string());
        assert_eq!(config.base_url(), "https://audio.example.com");
    }

    #[test]
    fn test_load_reports_bad_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("soundshelf.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        assert!(matches!(ServerConfig::load(&path), Err(Error::Config(_))));
    }
}
