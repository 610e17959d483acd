use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid session credential. The router is wrapped in
/// `require_auth`, so every handler here can extract the session `Principal`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // PATCH /user
        // Records a membership purchase on the caller's own record.
        .route("/user", patch(handlers::update_membership))
        .route("/user/{email}", get(handlers::get_user))
        // --- Posts ---
        // POST /addPost
        // The author is taken from the session, not the body.
        .route("/addPost", post(handlers::add_post))
        .route("/myPosts/{email}", get(handlers::my_posts))
        .route("/myPostsCount/{email}", get(handlers::my_posts_count))
        // DELETE /post/{id} is owner-only; PATCH /post/{id} stores vote totals.
        .route(
            "/post/{id}",
            patch(handlers::vote_post).delete(handlers::delete_post),
        )
        // --- Comments & Reports ---
        .route("/addComment", post(handlers::add_comment))
        .route("/addReport", post(handlers::add_report))
}
