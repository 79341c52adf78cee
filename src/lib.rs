pub mod config;
pub mod cryptography;
pub mod database;
pub mod error;
pub mod logging;
pub mod mail_manager;
pub mod mail_server;
pub mod message;
pub mod routes;
pub mod smtp_manager;
pub mod template;
pub mod r#trait;
pub mod user;
