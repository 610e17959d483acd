use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Admin Router Module
///
/// Moderation endpoints. The router is wrapped in `require_admin` inside
/// `require_auth`: the caller must hold a valid session, and the directory must list
/// them as `admin` at the time of the request.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- User moderation ---
        .route("/users", get(handlers::list_users))
        // PATCH /users/update/{email}
        // Promotes, demotes or changes the status of a user.
        .route("/users/update/{email}", patch(handlers::update_user))
        .route("/usersCount", get(handlers::count_users))
        // --- Content moderation ---
        .route("/addTags", post(handlers::add_tag))
        .route("/addAnnouncement", post(handlers::add_announcement))
        .route("/reports", get(handlers::list_reports))
}
