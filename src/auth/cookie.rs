//! Session transport: binds a credential to the client through the `token` cookie.
//!
//! The rest of the crate never touches cookie mechanics directly; it goes through
//! [`attach`], [`extract`] and [`clear`].

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::Env;

pub const SESSION_COOKIE: &str = "token";

/// Sets the session cookie carrying `token`.
pub fn attach(jar: CookieJar, token: String, env: Env) -> CookieJar {
    jar.add(session_cookie(token, env))
}

/// Reads the credential from the session cookie. Absence is normal for anonymous requests.
pub fn extract(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Expires the session cookie immediately. Safe to call without an active session.
///
/// The removal cookie is always emitted, even when the request carried no session
/// cookie, so the client ends up without one either way.
pub fn clear(jar: CookieJar, env: Env) -> CookieJar {
    let mut removal = session_cookie(String::new(), env);
    removal.make_removal();
    jar.add(removal)
}

fn session_cookie(value: String, env: Env) -> Cookie<'static> {
    // The production front-end lives on another site, so the cookie must be sent
    // cross-site, which browsers only allow on secure cookies.
    let (secure, same_site) = match env {
        Env::Production => (true, SameSite::None),
        Env::Local => (false, SameSite::Strict),
    };

    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .build()
}
