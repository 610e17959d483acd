use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the banner and health check, session
/// issuance and logout, the post-sign-in user upsert, and read-only forum content.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "Hello from BuzzBreeze Server.." }))
        .route("/health", get(|| async { "ok" }))
        // --- Session ---
        // POST /jwt
        // Issues the session credential and sets the `token` cookie.
        .route("/jwt", post(handlers::issue_token))
        // GET /logout
        // Expires the `token` cookie. Succeeds with or without an active session.
        .route("/logout", get(handlers::logout))
        // PUT /user
        // Registration / login upsert. Never grants a role.
        .route("/user", put(handlers::upsert_user))
        // --- Read-only content ---
        .route("/tags", get(handlers::list_tags))
        .route("/announcements", get(handlers::list_announcements))
        .route("/announcementsCount", get(handlers::count_announcements))
        // GET /posts?tags=...&page=...&size=...
        .route("/posts", get(handlers::list_posts))
        .route("/postsCount", get(handlers::count_posts))
        .route("/post/{id}", get(handlers::get_post))
        .route("/comment/{title}", get(handlers::list_comments))
        .route("/commentsCount", get(handlers::count_comments))
        .route("/myCommentCount/{title}", get(handlers::count_post_comments))
}
