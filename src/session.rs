//! Server-side sessions carried by a cookie, the one-shot flash messages stored
//! on them, and the extractors that resolve the requesting user.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use chrono::{Duration, Utc};
use model::entities::{session, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::schemas::{AppState, ErrorResponse, FlashLevel, FlashMessage};

/// Value of the session cookie in `headers`, if any.
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that installs the session cookie.
pub fn session_cookie(settings: &SessionSettings, session_id: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name,
        session_id,
        settings.ttl_hours * 3600
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(settings: &SessionSettings) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        settings.cookie_name
    )
}

/// Create a new session for `user_id`.
pub async fn start(
    db: &DatabaseConnection,
    settings: &SessionSettings,
    user_id: i32,
) -> Result<session::Model, DbErr> {
    let record = session::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(Some(user_id)),
        flash: Set(None),
        expires_at: Set(Utc::now() + Duration::hours(settings.ttl_hours)),
    };
    let created = record.insert(db).await?;
    debug!("Started session for user {}", user_id);
    Ok(created)
}

/// Look up a live session; an expired one is removed and treated as absent.
pub async fn load(db: &DatabaseConnection, session_id: &str) -> Result<Option<session::Model>, DbErr> {
    let Some(found) = session::Entity::find_by_id(session_id.to_string()).one(db).await? else {
        trace!("Unknown session id");
        return Ok(None);
    };
    if found.expires_at <= Utc::now() {
        debug!("Session expired, removing it");
        session::Entity::delete_by_id(found.id).exec(db).await?;
        return Ok(None);
    }
    Ok(Some(found))
}

/// Delete every expired session, returning how many were removed.
pub async fn purge_expired(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let result = session::Entity::delete_many()
        .filter(session::Column::ExpiresAt.lte(Utc::now()))
        .exec(db)
        .await?;
    debug!("Purged {} expired session(s)", result.rows_affected);
    Ok(result.rows_affected)
}

/// Remove a session. Unknown ids are ignored.
pub async fn destroy(db: &DatabaseConnection, session_id: &str) -> Result<(), DbErr> {
    let result = session::Entity::delete_by_id(session_id.to_string())
        .exec(db)
        .await?;
    debug!("Destroyed {} session(s)", result.rows_affected);
    Ok(())
}

/// Queue a message for the next page that drains the session's messages.
pub async fn push_flash(
    db: &DatabaseConnection,
    session_id: &str,
    level: FlashLevel,
    text: &str,
) -> Result<(), DbErr> {
    let Some(found) = session::Entity::find_by_id(session_id.to_string()).one(db).await? else {
        warn!("Dropping flash message for a missing session: {}", text);
        return Ok(());
    };
    let mut messages = decode_flash(found.flash.as_deref());
    messages.push(FlashMessage {
        level,
        text: text.to_string(),
    });

    let mut active = found.into_active_model();
    active.flash = Set(Some(encode_flash(&messages)?));
    active.update(db).await?;
    Ok(())
}

/// Return and clear all pending messages of a session.
pub async fn take_flash(db: &DatabaseConnection, session_id: &str) -> Result<Vec<FlashMessage>, DbErr> {
    let Some(found) = session::Entity::find_by_id(session_id.to_string()).one(db).await? else {
        return Ok(Vec::new());
    };
    if found.flash.is_none() {
        return Ok(Vec::new());
    }
    let messages = decode_flash(found.flash.as_deref());

    let mut active = found.into_active_model();
    active.flash = Set(None);
    active.update(db).await?;
    Ok(messages)
}

fn decode_flash(raw: Option<&str>) -> Vec<FlashMessage> {
    match raw {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable flash messages: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

fn encode_flash(messages: &[FlashMessage]) -> Result<String, DbErr> {
    serde_json::to_string(messages).map_err(|e| DbErr::Custom(e.to_string()))
}

fn internal_error(err: DbErr) -> Response {
    error!("Failed to resolve session: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(
            "Internal server error while reading session",
            "DATABASE_ERROR",
        )),
    )
        .into_response()
}

/// The requester as seen through the session cookie.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Id of a live session, if the cookie named one.
    pub session_id: Option<String>,
    /// Authenticated user, `None` for anonymous requests.
    pub user: Option<user::Model>,
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let anonymous = Principal {
            session_id: None,
            user: None,
        };
        let Some(session_id) =
            session_id_from_headers(&parts.headers, &state.settings.session.cookie_name)
        else {
            return Ok(anonymous);
        };
        let Some(live) = load(&state.db, &session_id).await.map_err(internal_error)? else {
            return Ok(anonymous);
        };

        let user = match live.user_id {
            Some(user_id) => user::Entity::find_by_id(user_id)
                .one(&state.db)
                .await
                .map_err(internal_error)?,
            None => None,
        };
        Ok(Principal {
            session_id: Some(live.id),
            user,
        })
    }
}

/// An authenticated user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct LoggedInUser {
    pub session_id: String,
    pub user: user::Model,
}

#[async_trait]
impl FromRequestParts<AppState> for LoggedInUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await? {
            Principal {
                session_id: Some(session_id),
                user: Some(user),
            } => Ok(LoggedInUser { session_id, user }),
            _ => Err(Redirect::to("/login").into_response()),
        }
    }
}

/// An authenticated staff user.
///
/// Anonymous requests are redirected to the login page, authenticated users
/// without staff status get `403 FORBIDDEN`.
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub session_id: String,
    pub user: user::Model,
}

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let LoggedInUser { session_id, user } = LoggedInUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            warn!("User '{}' denied access to the admin dashboard", user.username);
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new(
                    "Staff access required",
                    "FORBIDDEN",
                )),
            )
                .into_response());
        }
        Ok(StaffUser { session_id, user })
    }
}
