use uuid::Uuid;

/// Routing collaborator: turns a named action into a path relative to the site url.
pub trait UrlFor: Send + Sync {
    fn reset_path(&self, user_id: &Uuid, reset_key: &str) -> String;
}

/// Paths served by [`crate::routes`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ResetRoutes;

impl UrlFor for ResetRoutes {
    fn reset_path(&self, user_id: &Uuid, reset_key: &str) -> String {
        format!("user/reset/{}?key={}", user_id, reset_key)
    }
}
