use crate::{
    error::{DatabaseError, Error},
    mail_manager::{verify_reset_link, MailManager},
    routes::error_response,
    smtp_manager::Connector,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// User name, id or email address.
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetKey {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetLinkStatus {
    pub valid: bool,
}

fn send_reset_link<C: Connector>(
    mail_manager: &MailManager<C>,
    identifier: &str,
) -> Result<(), Error> {
    let mut user = mail_manager
        .get_users()
        .find_user(identifier)?
        .ok_or_else(|| DatabaseError::NoMatchingUser(identifier.to_string()))?;
    mail_manager.send_reset_link(&mut user)
}

pub async fn send_reset_link_route<C: Connector + 'static>(
    Extension(mail_manager): Extension<Arc<MailManager<C>>>,
    Json(reset_request): Json<ResetRequest>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || {
        send_reset_link(&mail_manager, reset_request.id.trim())
    })
    .await;
    match result {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            warn!("{err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn verify_reset_link_route<C: Connector + 'static>(
    Extension(mail_manager): Extension<Arc<MailManager<C>>>,
    Path(user_id): Path<Uuid>,
    Query(reset_key): Query<ResetKey>,
) -> impl IntoResponse {
    match mail_manager.get_users().get_user(&user_id) {
        Ok(Some(user)) => Json(ResetLinkStatus {
            valid: verify_reset_link(&user, &reset_key.key),
        })
        .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => error_response(err),
    }
}
