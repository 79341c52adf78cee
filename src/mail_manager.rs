use crate::{
    config::{Config, EmailsConfig, SiteConfig},
    cryptography::{make_key, MIN_RESET_KEY_LENGTH},
    database::UserRepository,
    error::{ConfigError, Error, MailError},
    message::{build_envelope, Headers},
    r#trait::{ResetRoutes, UrlFor},
    smtp_manager::{Connector, LettreConnector, SmtpManager},
    template::{Templates, INVITE_USER_TEMPLATE, RESET_PASSWORD_TEMPLATE},
    user::User,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug, Serialize)]
struct ResetLinkContext<'a> {
    reset_link: String,
    site_title: &'a str,
    site_url: &'a str,
    user_name: &'a str,
}

pub struct MailManager<C: Connector = LettreConnector> {
    site: SiteConfig,
    site_url: Url,
    mail_from: String,
    emails: EmailsConfig,
    smtp_manager: SmtpManager<C>,
    templates: Templates,
    users: Arc<dyn UserRepository>,
    routes: Box<dyn UrlFor>,
}

impl MailManager<LettreConnector> {
    pub fn from_config(config: &Config, users: Arc<dyn UserRepository>) -> Result<Self, Error> {
        Self::new(
            config,
            SmtpManager::from_config(&config.smtp)?,
            users,
            Box::new(ResetRoutes),
        )
    }
}

impl<C: Connector> MailManager<C> {
    pub fn new(
        config: &Config,
        smtp_manager: SmtpManager<C>,
        users: Arc<dyn UserRepository>,
        routes: Box<dyn UrlFor>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            site: config.site.to_owned(),
            site_url: config.site_url()?,
            mail_from: config.smtp.mail_from.to_owned(),
            emails: config.emails.to_owned(),
            smtp_manager,
            templates: Templates::new(config.emails.template_dir.as_deref()),
            users,
            routes,
        })
    }

    pub fn get_users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    pub fn get_smtp_manager(&self) -> &SmtpManager<C> {
        &self.smtp_manager
    }

    /// Sends as the site: the site title is the display name, `smtp.mail_from` the address.
    pub fn mail_recipient(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
        headers: Headers,
    ) -> Result<(), Error> {
        let envelope = build_envelope(
            recipient_name,
            recipient_email,
            &self.site.title,
            &self.mail_from,
            subject,
            body,
            headers,
        );
        self.smtp_manager.send(&envelope)
    }

    pub fn mail_user(
        &self,
        recipient: &User,
        subject: &str,
        body: &str,
        headers: Headers,
    ) -> Result<(), Error> {
        let email = recipient.get_email().ok_or(MailError::NoRecipientAddress)?;
        self.mail_recipient(recipient.get_display_name(), email, subject, body, headers)
    }

    pub fn get_reset_link(&self, user: &User) -> Result<String, Error> {
        let path = self
            .routes
            .reset_path(user.get_id(), user.get_reset_key().unwrap_or_default());
        Ok(self
            .site_url
            .join(&path)
            .map_err(ConfigError::InvalidSiteUrl)?
            .to_string())
    }

    fn render_reset_link_body(&self, template: &str, user: &User) -> Result<String, Error> {
        let context = ResetLinkContext {
            reset_link: self.get_reset_link(user)?,
            site_title: &self.site.title,
            site_url: &self.site.url,
            user_name: user.get_name(),
        };
        Ok(self.templates.render(template, context)?)
    }

    pub fn get_reset_link_body(&self, user: &User) -> Result<String, Error> {
        self.render_reset_link_body(RESET_PASSWORD_TEMPLATE, user)
    }

    pub fn get_invite_body(&self, user: &User) -> Result<String, Error> {
        self.render_reset_link_body(INVITE_USER_TEMPLATE, user)
    }

    /// Issues a new key, overwriting the previous one. The key is committed to the user
    /// store before it is set on `user`.
    pub fn create_reset_key(&self, user: &mut User) -> Result<(), Error> {
        let reset_key = make_key();
        self.users.update_reset_key(user.get_id(), &reset_key)?;
        user.set_reset_key(reset_key);
        Ok(())
    }

    pub fn send_reset_link(&self, user: &mut User) -> Result<(), Error> {
        self.create_reset_key(user)?;
        let body = self.get_reset_link_body(user)?;
        let subject = format_subject(&self.emails.reset_password_subject, &self.site.title);
        self.mail_user(user, &subject, &body, Headers::new())?;
        info!("Sent password reset link to user {}", user.get_name());
        Ok(())
    }

    pub fn send_invite(&self, user: &mut User) -> Result<(), Error> {
        self.create_reset_key(user)?;
        let body = self.get_invite_body(user)?;
        let subject = format_subject(&self.emails.invite_user_subject, &self.site.title);
        self.mail_user(user, &subject, &body, Headers::new())?;
        info!("Sent invite to user {}", user.get_name());
        Ok(())
    }
}

/// Fills `{site_title}` into a configured subject. `{{` and `}}` stand for literal braces,
/// any other placeholder is kept as written.
pub fn format_subject(subject: &str, site_title: &str) -> String {
    let mut formatted = String::with_capacity(subject.len() + site_title.len());
    let mut rest = subject;
    while let Some(index) = rest.find(['{', '}']) {
        formatted.push_str(&rest[..index]);
        rest = &rest[index..];
        if let Some(after) = rest.strip_prefix("{{") {
            formatted.push('{');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("}}") {
            formatted.push('}');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("{site_title}") {
            formatted.push_str(site_title);
            rest = after;
        } else {
            formatted.push_str(&rest[..1]);
            rest = &rest[1..];
        }
    }
    formatted.push_str(rest);
    formatted
}

/// Plain equality on the trimmed key, not constant time. Keys never expire, so this
/// must sit behind rate limiting.
pub fn verify_reset_link(user: &User, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    match user.get_reset_key() {
        Some(reset_key) if reset_key.len() >= MIN_RESET_KEY_LENGTH => key.trim() == reset_key,
        _ => false,
    }
}
