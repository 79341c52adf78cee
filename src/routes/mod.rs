pub mod invite;
pub mod reset;

use crate::{
    error::{DatabaseError, Error, MailError},
    mail_manager::MailManager,
    smtp_manager::Connector,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tracing::warn;

/// Shared secret guarding admin routes. An empty token counts as unset.
#[derive(Debug, Clone, Default)]
pub struct AdminToken(Option<Arc<str>>);

impl AdminToken {
    pub fn new(token: Option<&str>) -> Self {
        Self(
            token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(Arc::from),
        )
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn router<C: Connector + 'static>(
    mail_manager: Arc<MailManager<C>>,
    admin_token: AdminToken,
) -> Router {
    Router::new()
        .route("/user/reset", post(reset::send_reset_link_route::<C>))
        .route("/user/reset/:id", get(reset::verify_reset_link_route::<C>))
        .route("/user/:id/invite", post(invite::send_invite_route::<C>))
        .layer(Extension(admin_token))
        .layer(Extension(mail_manager))
}

pub(crate) fn error_response(err: Error) -> Response {
    warn!("{}", err);
    match err {
        Error::Database(DatabaseError::UserNotFound(_) | DatabaseError::NoMatchingUser(_)) => {
            StatusCode::NOT_FOUND
        }
        Error::Mail(MailError::NoRecipientAddress) => StatusCode::BAD_REQUEST,
        Error::Send(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
    .into_response()
}
