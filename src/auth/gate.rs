//! The two request gates.
//!
//! `require_auth` verifies the session credential and binds the [`Principal`] to the
//! request. `require_admin` is layered inside it on privileged routers and re-reads
//! the caller's role from the user directory on every request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::{AuthError, Principal, TokenCodec, cookie};
use crate::{
    clock::ClockState,
    models::{Role, User},
    repository::{DirectoryState, UserDirectory},
};

/// Authentication step, independent of the HTTP plumbing.
///
/// The verification failure reason is logged here and then folded into
/// `InvalidCredential`, which the client sees as a plain 401.
pub fn authenticate(jar: &CookieJar, codec: &TokenCodec, now: i64) -> Result<Principal, AuthError> {
    // 1. Absent cookie: anonymous request
    let token = cookie::extract(jar).ok_or(AuthError::NoCredential)?;

    // 2. Signature, then expiry; the reason stays in the logs
    codec.verify(&token, now).map_err(|reason| {
        tracing::warn!(%reason, "rejected session credential");
        AuthError::InvalidCredential(reason)
    })
}

/// Authorization step: the directory record, not the credential, decides the role.
pub async fn authorize(principal: &Principal, directory: &dyn UserDirectory) -> Result<User, AuthError> {
    match directory.find_user(&principal.email).await {
        Ok(Some(user)) if user.role == Role::Admin => Ok(user),
        Ok(record) => {
            tracing::warn!(
                email = %principal.email,
                role = ?record.map(|u| u.role),
                "admin access denied"
            );
            Err(AuthError::InsufficientPrivilege)
        }
        Err(e) => {
            tracing::error!(email = %principal.email, error = %e, "user directory lookup failed");
            Err(AuthError::DirectoryLookupFailure(e.to_string()))
        }
    }
}

/// require_auth
///
/// Middleware for the authenticated and admin routers. On success the decoded
/// `Principal` is inserted into the request extensions for the handler.
pub async fn require_auth(
    State(codec): State<TokenCodec>,
    State(clock): State<ClockState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // 1. Verify the cookie credential against the current time
    let principal = authenticate(&jar, &codec, clock.now())?;
    tracing::debug!(email = %principal.email, "session authenticated");

    // 2. Bind the principal for the handler and any inner gate
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// require_admin
///
/// Must run after `require_auth`. A request without a bound principal is rejected
/// as unauthenticated and never reaches the directory.
pub async fn require_admin(
    State(directory): State<DirectoryState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // 1. The principal bound by `require_auth`
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(AuthError::NoCredential)?;

    // 2. Fresh role lookup; nothing from the credential is trusted here
    let user = authorize(&principal, directory.as_ref()).await?;

    // 3. Hand the directory record to the handler
    request.extensions_mut().insert(AdminUser(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::NoCredential)
    }
}

/// The directory record of an admin that passed `require_admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminUser>()
            .cloned()
            .ok_or(AuthError::InsufficientPrivilege)
    }
}
