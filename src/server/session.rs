//! Resolves the caller of a request into a [`Session`].
//!
//! The token is taken from the `session_token` cookie, or else from the
//! `Authorization` header, where a `Bearer ` prefix is accepted but not required.

use super::server::internal_error;
use super::state::ServerState;
use crate::user::auth::AuthTokenValue;
use crate::user::{Permission, UserManager};

use anyhow::Result;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug)]
pub struct Session {
    pub user_id: usize,
    pub token: AuthTokenValue,
    pub permissions: Vec<Permission>,
}

impl Session {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Looks `token` up and marks it as used. `Ok(None)` for unknown tokens.
    fn resolve(user_manager: &UserManager, token: AuthTokenValue) -> Result<Option<Session>> {
        let Some(auth_token) = user_manager.get_auth_token(&token)? else {
            return Ok(None);
        };
        if let Err(err) = user_manager.update_auth_token_last_used(&token) {
            warn!(
                "Could not update last use of a token of user {}: {:#}",
                auth_token.user_id, err
            );
        }
        let permissions = user_manager.get_user_permissions(auth_token.user_id)?;
        Ok(Some(Session {
            user_id: auth_token.user_id,
            token,
            permissions,
        }))
    }
}

pub enum SessionRejection {
    Unauthenticated,
    Store(anyhow::Error),
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            SessionRejection::Unauthenticated => StatusCode::FORBIDDEN.into_response(),
            SessionRejection::Store(err) => internal_error("session", err),
        }
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<AuthTokenValue> {
    if let Some(cookie) = CookieJar::from_headers(headers).get(COOKIE_SESSION_TOKEN_KEY) {
        return Some(AuthTokenValue(cookie.value().to_string()));
    }
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    (!token.is_empty()).then(|| AuthTokenValue(token.to_string()))
}

fn session_from_parts(
    parts: &Parts,
    state: &ServerState,
) -> Result<Option<Session>, SessionRejection> {
    let Some(token) = token_from_headers(&parts.headers) else {
        return Ok(None);
    };
    let user_manager = state.user_manager.lock().unwrap();
    Session::resolve(&user_manager, token).map_err(SessionRejection::Store)
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state)?.ok_or(SessionRejection::Unauthenticated)
    }
}

impl FromRequestParts<ServerState> for Option<Session> {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state)
    }
}
