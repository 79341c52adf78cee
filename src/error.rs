use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct StdIoError(#[from] pub std::io::Error);

#[derive(Error, Debug)]
#[error("{0}")]
pub struct TomlDeError(#[from] pub toml::de::Error);

#[derive(Error, Debug)]
#[error("{0}")]
pub struct TomlSerError(#[from] pub toml::ser::Error);

#[derive(Error, Debug)]
pub enum MailError {
    #[error("No recipient email address available!")]
    NoRecipientAddress,
}

/// Transport and protocol failures. Surfaced to the caller as is, never retried.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Connect({0})")]
    Connect(String),
    #[error("server does not support STARTTLS")]
    StartTlsUnsupported,
    #[error("Protocol({0})")]
    Protocol(String),
    #[error("InvalidAddress({0})")]
    InvalidAddress(String),
    #[error("Compose({0})")]
    Compose(String),
}

impl From<lettre::transport::smtp::Error> for SendError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Misconfiguration. These abort startup instead of degrading at send time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("If smtp.user is configured then smtp.password must be configured as well.")]
    MissingSmtpPassword,
    #[error("Read({0}, {1})")]
    Read(StdIoError, PathBuf),
    #[error("Parse({0})")]
    Parse(#[from] TomlDeError),
    #[error("InvalidSiteUrl({0})")]
    InvalidSiteUrl(url::ParseError),
    #[error("InvalidMailFrom({0})")]
    InvalidMailFrom(String),
    #[error("NoConfigDirectory")]
    NoConfigDirectory,
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("NotFound({0})")]
    NotFound(String),
    #[error("Render({0})")]
    Render(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("UserNotFound({0})")]
    UserNotFound(Uuid),
    #[error("NoMatchingUser({0})")]
    NoMatchingUser(String),
    #[error("Read({0})")]
    Read(StdIoError),
    #[error("Parse({0})")]
    Parse(#[from] TomlDeError),
    #[error("Serialise({0})")]
    Serialise(#[from] TomlSerError),
    #[error("Write({0})")]
    Write(StdIoError),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Bind({0})")]
    Bind(StdIoError),
    #[error("Logging({0})")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mail({0})")]
    Mail(#[from] MailError),
    #[error("Send({0})")]
    Send(#[from] SendError),
    #[error("Config({0})")]
    Config(#[from] ConfigError),
    #[error("Template({0})")]
    Template(#[from] TemplateError),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
    #[error("Startup({0})")]
    Startup(#[from] StartupError),
}
