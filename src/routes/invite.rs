use crate::{
    error::{DatabaseError, Error},
    mail_manager::MailManager,
    routes::{error_response, AdminToken},
    smtp_manager::Connector,
};
use axum::{
    extract::Path,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

fn send_invite<C: Connector>(mail_manager: &MailManager<C>, user_id: &Uuid) -> Result<(), Error> {
    let mut user = mail_manager
        .get_users()
        .get_user(user_id)?
        .ok_or(DatabaseError::UserNotFound(*user_id))?;
    mail_manager.send_invite(&mut user)
}

/// Invites are an admin action: `Authorization: Bearer <server.admin_token>` is required.
pub async fn send_invite_route<C: Connector + 'static>(
    Extension(mail_manager): Extension<Arc<MailManager<C>>>,
    Extension(admin_token): Extension<AdminToken>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(expected) = admin_token.get() else {
        warn!("Refused invite for {}, no admin token configured", user_id);
        return StatusCode::FORBIDDEN.into_response();
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if presented.map(str::trim) != Some(expected) {
        warn!("Refused unauthorised invite for {}", user_id);
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match tokio::task::spawn_blocking(move || send_invite(&mail_manager, &user_id)).await {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            warn!("{err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
