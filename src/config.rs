use crate::error::{ConfigError, Error, StdIoError, TomlDeError};
use directories::ProjectDirs;
use email_address::EmailAddress;
use serde::Deserialize;
use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
};
use url::Url;

pub const CONFIG_PATH_VARIABLE: &str = "MAILER_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub server: String,
    pub starttls: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub mail_from: String,
    /// Verification endpoint. When set, `server`, `starttls`, `user` and `password` are ignored.
    pub test_server: Option<String>,
    pub hello_name: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            starttls: false,
            user: None,
            password: None,
            mail_from: String::new(),
            test_server: None,
            hello_name: None,
            timeout_seconds: Some(60),
        }
    }
}

impl SmtpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !EmailAddress::is_valid(&self.mail_from) {
            return Err(ConfigError::InvalidMailFrom(self.mail_from.to_owned()));
        }
        if self.test_server.is_some() {
            return Ok(());
        }
        let has_user = self.user.as_deref().is_some_and(|user| !user.is_empty());
        let has_password = self
            .password
            .as_deref()
            .is_some_and(|password| !password.is_empty());
        if has_user && !has_password {
            return Err(ConfigError::MissingSmtpPassword);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailsConfig {
    pub reset_password_subject: String,
    pub invite_user_subject: String,
    pub template_dir: Option<PathBuf>,
}

impl Default for EmailsConfig {
    fn default() -> Self {
        Self {
            reset_password_subject: "Reset your password - {site_title}".to_string(),
            invite_user_subject: "Invite for {site_title}".to_string(),
            template_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub allowed_origins: Vec<String>,
    /// Bearer token for admin routes. Those routes refuse every request while unset.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 1], 8886)),
            allowed_origins: Vec::new(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub emails: EmailsConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(toml_string: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_string).map_err(|err| ConfigError::Parse(TomlDeError(err)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// The file named by `MAILER_CONFIG`, falling back to the per-user config directory.
    pub fn locate() -> Result<PathBuf, Error> {
        Ok(Self::locate_from(
            env::var_os(CONFIG_PATH_VARIABLE).map(PathBuf::from),
        )?)
    }

    fn locate_from(override_path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        match override_path.filter(|path| !path.as_os_str().is_empty()) {
            Some(path) => Ok(path),
            None => Ok(ProjectDirs::from("org", "mailer", "mailer")
                .ok_or(ConfigError::NoConfigDirectory)?
                .config_dir()
                .join("config.toml")),
        }
    }

    pub fn load() -> Result<Self, Error> {
        Self::from_file(Self::locate()?)
    }

    /// Runs before logging is installed, so it does not log itself.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let toml_string = fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(StdIoError(err), path.to_path_buf()))?;
        Self::from_str(&toml_string)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let _ = self.site_url()?;
        self.smtp.validate()
    }

    pub fn site_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.site.url).map_err(ConfigError::InvalidSiteUrl)
    }
}
