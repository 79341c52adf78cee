use crate::error::TemplateError;
use minijinja::{path_loader, Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;

pub const RESET_PASSWORD_TEMPLATE: &str = "emails/reset_password.txt";
pub const INVITE_USER_TEMPLATE: &str = "emails/invite_user.txt";

fn builtin_template(name: &str) -> Option<&'static str> {
    match name {
        RESET_PASSWORD_TEMPLATE => Some(include_str!("../templates/emails/reset_password.txt")),
        INVITE_USER_TEMPLATE => Some(include_str!("../templates/emails/invite_user.txt")),
        _ => None,
    }
}

/// Plain text email templates. A configured directory shadows the built-in templates.
pub struct Templates {
    environment: Environment<'static>,
}

impl Templates {
    pub fn new(template_dir: Option<&Path>) -> Self {
        let mut environment = Environment::new();
        environment.set_undefined_behavior(UndefinedBehavior::Strict);
        environment.set_keep_trailing_newline(true);
        let directory_loader = template_dir.map(path_loader);
        environment.set_loader(move |name| {
            if let Some(loader) = directory_loader.as_ref() {
                if let Some(source) = loader(name)? {
                    return Ok(Some(source));
                }
            }
            Ok(builtin_template(name).map(str::to_owned))
        });
        Self { environment }
    }

    pub fn render<S: Serialize>(&self, name: &str, variables: S) -> Result<String, TemplateError> {
        let template = self
            .environment
            .get_template(name)
            .map_err(|err| match err.kind() {
                ErrorKind::TemplateNotFound => TemplateError::NotFound(name.to_string()),
                _ => TemplateError::Render(err.to_string()),
            })?;
        template
            .render(variables)
            .map_err(|err| TemplateError::Render(err.to_string()))
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new(None)
    }
}
